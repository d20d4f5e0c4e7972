mod app;
mod cli;
mod error;
mod firmware;
mod handlers;
mod hw;
mod message;
mod protocol;
mod telemetry;
mod terminal;
mod utils;

pub use app::{run, run_with_clients, run_with_log_level};
pub use cli::{
    Args, Command, DecodeArgs, DecryptArgs, EncodeArgs, EncodeRequest, FocusEntry, LogLevel,
    OutputFormat, SetSettingsArgs, StatusTarget,
};
pub use error::{DriverError, ProtocolError};
pub use firmware::{
    BLOCK_HEADER_LEN, CipherState, FirmwareDecryptor, FirmwareError, KEY_LEN, MAX_BLOCK_DATA_LEN,
    derive_working_key,
};
pub use handlers::{
    CommandRegistry, ConsoleStatus, DeviceErrorCode, Direction, FocusByteError, Frame,
    FrameCodec, FrameCodecError, FrameDecoder, ParseError, ParsedPayload, PayloadDetails,
    SETTINGS_PAYLOAD_LEN, STATUS_BODY_LEN, SequenceCounter, SettingsCodec, StatusDecoder,
    StatusDetails, StatusReport, crc16, focus_byte_to_number, focus_number_to_byte,
};
pub use hw::{
    AdapterInfo, CatalogError, DecodeContext, DeviceState, DirectoryCatalog, FOCUS_COLUMNS,
    FOCUS_ROWS, FocusColumn, FocusGrid, FocusLimiter, FollowUp, LensCapabilities, LensCatalog,
    LensInfo, LensSettings, LensVersions, LensXmlData, MemoryTransport, MessageHandler, MountType,
    Setting, TapInDriver, Transport, TransportError, VcModeSlot, catalog_file_name,
};
pub use message::{MessageSource, TapInMessage};
pub use protocol::{Destination, Opcode, POSTAMBLE, PREAMBLE};
pub use terminal::TerminalClient;
