//! Main command codes and reply status codes.

/// Login verification: the body carries the session token
pub const LOGIN_AUTH: u32 = 1001;

/// Daily sign-in
pub const SIGN_DAY: u32 = 1002;

/// Sub command values used on reply frames
pub mod status {
    pub const OK: u32 = 0;
    pub const REJECTED: u32 = 1;
    pub const UNAUTHENTICATED: u32 = 2;
}

/// Known main commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    LoginAuth,
    SignDay,
    Other(u32),
}

impl Command {
    pub fn code(self) -> u32 {
        match self {
            Command::LoginAuth => LOGIN_AUTH,
            Command::SignDay => SIGN_DAY,
            Command::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::LoginAuth => "LOGIN_AUTH",
            Command::SignDay => "SIGN_DAY",
            Command::Other(_) => "OTHER",
        }
    }
}

impl From<u32> for Command {
    fn from(code: u32) -> Self {
        match code {
            LOGIN_AUTH => Command::LoginAuth,
            SIGN_DAY => Command::SignDay,
            other => Command::Other(other),
        }
    }
}
