use parley_core::{ChatRequest, Message, ParleyError, PromptInput, Role, StopCause};

#[test]
fn test_role_serde_is_lowercase_and_closed() {
    let msg: Message = serde_json::from_str(r#"{"role": "system", "content": "be brief"}"#).unwrap();
    assert_eq!(msg, Message::system("be brief"));
    assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), "assistant");

    assert!(serde_json::from_str::<Message>(r#"{"role": "tool", "content": "x"}"#).is_err());
    assert!(serde_json::from_str::<Message>(r#"{"role": "User", "content": "x"}"#).is_err());
}

#[test]
fn test_role_display() {
    assert_eq!(Role::User.to_string(), "user");
    assert_eq!(Role::System.as_str(), "system");
}

#[test]
fn test_request_constructors() {
    let chat = ChatRequest::messages(vec![Message::user("hi")]);
    assert!(chat.add_special);
    assert!(matches!(chat.input, PromptInput::Messages(ref m) if m.len() == 1));

    let raw = ChatRequest::raw("[INST] hi [/INST]", false);
    assert!(!raw.add_special);
    assert_eq!(raw.input, PromptInput::Raw("[INST] hi [/INST]".into()));
}

#[test]
fn test_stop_cause_wire_names() {
    assert_eq!(serde_json::to_value(StopCause::EndOfSequence).unwrap(), "end_of_sequence");
    assert_eq!(serde_json::to_value(StopCause::StopString).unwrap(), "stop_string");
    assert_eq!(serde_json::to_value(StopCause::Length).unwrap(), "length");
}

#[test]
fn test_client_error_classification() {
    assert!(ParleyError::ConflictingInputMode.is_client_error());
    assert!(ParleyError::InvalidModelName.is_client_error());
    assert!(ParleyError::InvalidRequest("empty".into()).is_client_error());
    assert!(!ParleyError::GenerationFailed("oom".into()).is_client_error());
    assert!(!ParleyError::Cancelled.is_client_error());
    assert!(!ParleyError::UnknownTokenKind("bos".into()).is_client_error());
}
