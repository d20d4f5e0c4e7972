mod catalog;
mod driver;
mod model;
mod state;
mod transport;

pub use self::catalog::{CatalogError, DirectoryCatalog, LensCatalog, LensXmlData, catalog_file_name};
pub use self::driver::{MessageHandler, TapInDriver};
pub use self::model::{
    AdapterInfo, DecodeContext, FOCUS_COLUMNS, FOCUS_ROWS, FocusColumn, FocusGrid, FocusLimiter,
    LensCapabilities, LensInfo, LensSettings, LensVersions, MountType, Setting, VcModeSlot,
};
pub use self::state::{DeviceState, FollowUp};
pub use self::transport::{MemoryTransport, Transport, TransportError};
