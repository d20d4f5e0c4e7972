pub(crate) mod command;
pub(crate) mod decode;
pub(crate) mod decrypt;
pub(crate) mod encode;
pub(crate) mod ui;

pub use self::command::{Args, Command, LogLevel, OutputFormat};
pub use self::decode::DecodeArgs;
pub use self::decrypt::DecryptArgs;
pub use self::encode::{EncodeArgs, EncodeRequest, FocusEntry, SetSettingsArgs, StatusTarget};
