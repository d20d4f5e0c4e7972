use serde::Serialize;
use strum_macros::Display;
use tracing::{debug, info, warn};

use super::catalog::LensCatalog;
use super::model::{AdapterInfo, DecodeContext, LensInfo, LensSettings};
use crate::handlers::{PayloadDetails, StatusDetails, StatusReport};
use crate::message::{MessageSource, TapInMessage};
use crate::protocol::{Destination, Opcode};

/// Command the orchestration layer should issue next.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowUp {
    #[strum(to_string = "check-lens-attached")]
    CheckLensAttached,
    #[strum(to_string = "power-on")]
    PowerOn,
    #[strum(to_string = "power-off")]
    PowerOff,
    #[strum(to_string = "get-console-status")]
    GetConsoleStatus,
    #[strum(to_string = "get-lens-status")]
    GetLensStatus,
    #[strum(to_string = "get-settings")]
    GetSettings,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct PreviousMessage {
    cmd: Option<u8>,
    destination: Option<Destination>,
}

/// Aggregate adapter, lens and settings state built from parsed messages.
#[derive(Default)]
pub struct DeviceState {
    adapter: AdapterInfo,
    lens: Option<LensInfo>,
    settings: Option<LensSettings>,
    previous: Option<PreviousMessage>,
    catalog: Option<Box<dyn LensCatalog + Send + Sync>>,
}

impl DeviceState {
    /// Creates an empty, disconnected state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a vendor metadata catalog used when decoding lens status.
    #[must_use]
    pub fn with_catalog(mut self, catalog: impl LensCatalog + Send + Sync + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    #[must_use]
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    #[must_use]
    pub fn lens(&self) -> Option<&LensInfo> {
        self.lens.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> Option<&LensSettings> {
        self.settings.as_ref()
    }

    /// Returns the decode context for the next inbound chunk.
    #[must_use]
    pub fn context(&self) -> DecodeContext<'_> {
        DecodeContext::builder()
            .maybe_lens(self.lens.as_ref())
            .adapter(&self.adapter)
            .maybe_catalog(self.catalog.as_deref().map(|catalog| catalog as &dyn LensCatalog))
            .build()
    }

    /// Marks the transport as open.
    pub fn connect(&mut self) {
        self.adapter.connected = true;
        info!("adapter connected");
    }

    /// Marks the transport as closed and forgets everything learned about the lens.
    pub fn disconnect(&mut self) {
        self.lens = None;
        self.settings = None;
        self.previous = None;
        self.adapter.connected = false;
        self.adapter.lens_attached = None;
        info!("adapter disconnected");
    }

    /// Merges one message and returns the commands to issue next.
    pub fn apply(&mut self, message: &TapInMessage) -> Vec<FollowUp> {
        let follow_ups = match message.source {
            MessageSource::Host => Vec::new(),
            MessageSource::Console => self.apply_response(message),
        };
        self.previous = Some(PreviousMessage {
            cmd: message.parsed.cmd,
            destination: message.destination(),
        });
        if !follow_ups.is_empty() {
            debug!(?follow_ups, "follow-up commands");
        }
        follow_ups
    }

    fn apply_response(&mut self, message: &TapInMessage) -> Vec<FollowUp> {
        let details = message.parsed.details.as_ref();
        match (message.parsed.opcode(), details) {
            (
                Some(Opcode::GetStatus),
                Some(PayloadDetails::Status(StatusDetails {
                    report: Some(report),
                    ..
                })),
            ) => match report {
                StatusReport::Console(status) => {
                    status.apply_to(&mut self.adapter);
                    vec![FollowUp::CheckLensAttached]
                }
                StatusReport::Lens(lens) => {
                    self.lens = Some(lens.as_ref().clone());
                    vec![FollowUp::GetSettings]
                }
            },
            (Some(Opcode::GetSettings), Some(PayloadDetails::Settings(settings))) => {
                let prior_vc_mode = self.settings.and_then(|prior| prior.vc_mode);
                self.settings = Some(LensSettings {
                    vc_mode: settings.vc_mode.or(prior_vc_mode),
                    ..*settings
                });
                Vec::new()
            }
            (Some(Opcode::SetSettings), _) => vec![FollowUp::GetSettings],
            (Some(Opcode::IsLensAttached), Some(PayloadDetails::LensAttached { attached })) => {
                self.adapter.lens_attached = Some(*attached);
                if *attached {
                    vec![FollowUp::PowerOn]
                } else {
                    vec![FollowUp::CheckLensAttached]
                }
            }
            (Some(Opcode::PowerOn), Some(PayloadDetails::PowerOn { power_on: true })) => {
                vec![FollowUp::GetLensStatus]
            }
            (Some(Opcode::PowerOn), Some(PayloadDetails::PowerOn { power_on: false })) => {
                warn!("lens power on failed");
                Vec::new()
            }
            (Some(Opcode::Error), _) => self.recover_from_error(),
            _ => Vec::new(),
        }
    }

    fn recover_from_error(&self) -> Vec<FollowUp> {
        let Some(previous) = self.previous else {
            warn!("device error with no previous message");
            return Vec::new();
        };

        match previous.cmd.and_then(Opcode::from_byte) {
            Some(Opcode::PowerOn) => vec![FollowUp::PowerOff, FollowUp::CheckLensAttached],
            Some(Opcode::GetSettings) => vec![FollowUp::CheckLensAttached],
            Some(Opcode::GetStatus) if previous.destination == Some(Destination::Lens) => {
                vec![FollowUp::CheckLensAttached]
            }
            Some(Opcode::Error) => {
                warn!("repeated device errors; giving up");
                Vec::new()
            }
            other => {
                debug!(previous = ?other, "no recovery for device error");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceState")
            .field("adapter", &self.adapter)
            .field("lens", &self.lens.as_ref().map(|lens| lens.model.as_str()))
            .field("settings", &self.settings)
            .field("catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}
