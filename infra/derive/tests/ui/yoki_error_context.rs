use std::borrow::Cow;
use yoki_derive::yoki_error;

#[yoki_error]
pub enum SlotError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Slot {slot} is empty{}", format_context(.context))]
    Empty { slot: i32, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read_missing() -> Result<Vec<u8>, SlotError> {
    let bytes = std::fs::read("/definitely/not/here/save_0.yoki").context("Reading slot 0")?;
    Ok(bytes)
}

fn empty() -> Result<(), SlotError> {
    Err(SlotError::Empty { slot: 3, context: None }).context("Loading slot 3")
}

fn internal() -> Result<(), SlotError> {
    Err("boom".into())
}

fn main() {
    let err = read_missing().unwrap_err();
    assert!(matches!(err, SlotError::Io { .. }));
    assert_eq!(err.context_message(), Some("Reading slot 0"));

    let err = empty().unwrap_err();
    assert_eq!(err.to_string(), "Slot 3 is empty (Loading slot 3)");

    let err = internal().unwrap_err();
    assert_eq!(err.to_string(), "Internal error: boom");
    assert_eq!(err.context_message(), None);
}
