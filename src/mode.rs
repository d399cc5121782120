use crate::cli::Invocation;

/// The single execution path chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ResetAndReprompt,
    UrlOnlyQuery,
    ChatLoop,
    SingleShotArgs,
    PipeIngestion,
    NoOpExit,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResetAndReprompt => "reset",
            Self::UrlOnlyQuery => "url",
            Self::ChatLoop => "chat",
            Self::SingleShotArgs => "single-shot",
            Self::PipeIngestion => "pipe",
            Self::NoOpExit => "no-op",
        }
    }
}

/// The facts mode selection looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeInputs {
    pub reset: bool,
    pub url: bool,
    pub chat: bool,
    pub positional: bool,
    pub message: bool,
    pub interactive: bool,
}

impl ModeInputs {
    pub fn from_invocation(invocation: &Invocation, interactive: bool) -> Self {
        Self {
            reset: invocation.reset,
            url: invocation.url.is_some(),
            chat: invocation.chat,
            positional: invocation.has_prompt(),
            message: invocation.message.is_some(),
            interactive,
        }
    }
}

/// First matching rule wins; the raw flags overlap, so order matters.
pub fn select_mode(inputs: &ModeInputs) -> Mode {
    if inputs.reset {
        return Mode::ResetAndReprompt;
    }
    if inputs.url && !inputs.positional && !inputs.chat {
        return Mode::UrlOnlyQuery;
    }
    if inputs.chat {
        return Mode::ChatLoop;
    }
    if inputs.positional || (inputs.interactive && (inputs.url || inputs.message)) {
        return Mode::SingleShotArgs;
    }
    if inputs.interactive {
        return Mode::NoOpExit;
    }
    Mode::PipeIngestion
}
