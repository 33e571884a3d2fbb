use std::borrow::Cow;
use yoki_derive::yoki_error;

#[yoki_error]
pub enum StepError {
    #[error("Step v{from} -> v{to} failed{}: {source}", format_context(.context))]
    Step {
        from: i32,
        to: i32,
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::fmt::Error, context: Option<Cow<'static, str>> },
}

fn main() {
    let err = StepError::Step {
        from: 1,
        to: 2,
        source: std::io::Error::other("disk"),
        context: Some("Upgrading".into()),
    };
    assert_eq!(err.to_string(), "Step v1 -> v2 failed (Upgrading): disk");
    assert_eq!(err.context_message(), Some("Upgrading"));

    let converted: StepError = std::fmt::Error.into();
    assert!(matches!(converted, StepError::Io { context: None, .. }));
}
