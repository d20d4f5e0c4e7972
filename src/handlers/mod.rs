mod crc;
mod device_error;
mod frame_codec;
mod power;
mod registry;
mod settings;
mod status;

pub use self::crc::crc16;
pub use self::device_error::DeviceErrorCode;
pub use self::frame_codec::{Frame, FrameCodec, FrameCodecError, FrameDecoder, SequenceCounter};
pub use self::registry::{CommandRegistry, Direction, ParseError, ParsedPayload, PayloadDetails};
pub use self::settings::{
    FocusByteError, SETTINGS_PAYLOAD_LEN, SettingsCodec, focus_byte_to_number,
    focus_number_to_byte,
};
pub use self::status::{
    ConsoleStatus, STATUS_BODY_LEN, StatusDecoder, StatusDetails, StatusReport,
};
