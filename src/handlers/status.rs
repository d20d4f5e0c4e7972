use serde::Serialize;
use tracing::{instrument, warn};

use crate::hw::{
    AdapterInfo, DecodeContext, FOCUS_ROWS, FocusLimiter, LensCapabilities, LensInfo,
    LensVersions, MountType,
};
use crate::protocol::{Destination, Opcode};

use super::registry::{Direction, ParseError, ParsedPayload, PayloadDetails, payload_of};

/// Length of a status response body, excluding the opcode byte.
pub const STATUS_BODY_LEN: usize = 85;

const NAME_FIELD_LEN: usize = 16;

/// Console fields decoded from a GET_STATUS response.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ConsoleStatus {
    pub firmware_version: u16,
    /// `None` when the console reported a mount outside the known set.
    pub mount_type: Option<MountType>,
    pub mount_byte: u8,
    pub hardware_version: u8,
    pub connection_version: u16,
}

impl ConsoleStatus {
    /// Merges these fields into the caller's adapter snapshot.
    pub fn apply_to(&self, adapter: &mut AdapterInfo) {
        adapter.firmware_version = Some(self.firmware_version);
        adapter.mount_type = self.mount_type;
        adapter.hardware_version = Some(self.hardware_version);
        adapter.connection_version = Some(self.connection_version);
    }
}

/// Decoded status report for one target.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub enum StatusReport {
    Console(ConsoleStatus),
    Lens(Box<LensInfo>),
}

/// GET_STATUS details: the queried target and, for well-formed responses, its report.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct StatusDetails {
    pub target: Destination,
    pub report: Option<StatusReport>,
}

/// Decoder for fixed-layout GET_STATUS response bodies.
pub struct StatusDecoder;

impl StatusDecoder {
    /// Decodes a console status body.
    #[must_use]
    pub fn decode_console(body: &[u8; STATUS_BODY_LEN]) -> ConsoleStatus {
        let mount_byte = body[47];
        let mount_type = MountType::from_status_byte(mount_byte);
        if mount_type.is_none() {
            warn!(mount_byte, "unknown mount type");
        }

        ConsoleStatus {
            firmware_version: u16::from_le_bytes([body[35], body[36]]),
            mount_type,
            mount_byte,
            hardware_version: body[48],
            connection_version: u16::from_le_bytes([body[49], body[50]]),
        }
    }

    /// Decodes a lens status body, attaching catalog metadata when the context can supply it.
    #[instrument(skip_all, level = "debug")]
    pub fn decode_lens(body: &[u8; STATUS_BODY_LEN], context: &DecodeContext<'_>) -> LensInfo {
        let model = nul_terminated(&body[3..3 + NAME_FIELD_LEN]);
        let serial = nul_terminated(&body[19..19 + NAME_FIELD_LEN]);

        let pair = |offset: usize| [body[offset], body[offset + 1]];
        let versions = LensVersions {
            main0: pair(35),
            main1: pair(37),
            sub0: pair(39),
            sub1: pair(41),
            hw: pair(47),
            conn: pair(49),
        };

        let limiter_options = body[55];
        let mut mode_bits = (limiter_options & 0xF0) >> 4;
        let mut modes = [0_u8; 4];
        for mode in &mut modes {
            *mode = if mode_bits & 0x01 == 0x01 { 2 } else { 1 };
            mode_bits >>= 1;
        }

        let partition = body[56];
        let mut init = [0_i16; 4];
        for (index, slot) in init.iter_mut().enumerate() {
            *slot = i16::from(partition) - 1 - i16::from(body[65 + index]);
        }

        let mut adj_focus_index = [0_u16; FOCUS_ROWS];
        for (index, slot) in adj_focus_index.iter_mut().enumerate() {
            let offset = 69 + index * 2;
            *slot = u16::from_le_bytes([body[offset], body[offset + 1]]);
        }

        let xml_data = context.lens_xml(&model);

        LensInfo {
            conversion_lens_id: body[0],
            model,
            serial,
            versions,
            capabilities: LensCapabilities::from_bits(body[51]),
            adj_vc_type: body[52] == 0x01,
            focus_focal_lengths: body[53],
            focus_per_focal_length: body[54],
            focus_limiter: FocusLimiter {
                count: limiter_options & 0x03,
                kind: (limiter_options >> 2) & 0x03,
                modes,
                partition,
                init,
            },
            adj_focus_max: body[63],
            adj_focus_min: i8::from_le_bytes([body[64]]),
            adj_focus_index,
            xml_data,
        }
    }
}

/// Decodes up to the first NUL, or the whole field when none is present.
fn nul_terminated(field: &[u8]) -> String {
    let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Parses GET_STATUS requests and responses, branching on header byte 2.
pub(crate) fn parse_status(
    frame: &[u8],
    direction: Direction,
    context: &DecodeContext<'_>,
) -> Result<ParsedPayload, ParseError> {
    let payload = payload_of(frame)?;
    let parsed = ParsedPayload::new(Opcode::GetStatus.byte());

    if direction.was_sent() {
        return Ok(parsed.with_human("Get Status"));
    }

    let target = Destination::from(u16::from(frame[2]));
    let body = payload.get(1..).unwrap_or_default();
    let Ok(body) = <&[u8; STATUS_BODY_LEN]>::try_from(body) else {
        warn!(len = body.len(), "status body should be 85 bytes");
        return Ok(parsed.with_details(PayloadDetails::Status(StatusDetails {
            target,
            report: None,
        })));
    };

    let (human, report) = match target {
        Destination::Lens => (
            "Lens Status: ",
            StatusReport::Lens(Box::new(StatusDecoder::decode_lens(body, context))),
        ),
        Destination::Console => (
            "TAP-in Console Status: ",
            StatusReport::Console(StatusDecoder::decode_console(body)),
        ),
        Destination::Unknown(_) => {
            warn!(%target, "cannot tell which device the status is for");
            return Ok(parsed.with_details(PayloadDetails::Status(StatusDetails {
                target,
                report: None,
            })));
        }
    };

    Ok(parsed
        .with_human(human)
        .with_details(PayloadDetails::Status(StatusDetails {
            target,
            report: Some(report),
        })))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::handlers::CommandRegistry;
    use crate::hw::LensCatalog;

    const CONSOLE_STATUS_FRAME: [u8; 95] = [
        0x0F, 0x01, 0x01, 0x00, 0x56, 0x00, 0xFA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0xF3, 0x58, 0xF0,
    ];

    const LENS_STATUS_FRAME: [u8; 95] = [
        0x0F, 0x06, 0x00, 0x00, 0x56, 0x00, 0xFA, 0x00, 0x00, 0x00, 0x46, 0x30, 0x31, 0x33, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x30, 0x30, 0x30,
        0x31, 0x39, 0x30, 0x33, 0x30, 0x30, 0x30, 0x30, 0x37, 0x33, 0x31, 0x35, 0x03, 0x01, 0x02,
        0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x0B, 0x00,
        0x01, 0x03, 0x00, 0x35, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14, 0xEC, 0x00, 0x00, 0x00,
        0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00, 0x2D, 0x00,
        0x2D, 0x00, 0x60, 0xE0, 0xF0,
    ];

    const F013_N0_XML: &str = "<lensinfo>F013,A013,SP 45mm F/1.8 Di VC USD,3.1,true,false,true,true,1,3,45,45,45,45,45,45,45,45,30,-30,0,1,1,1,1,1,035E5241374047595E28645E5C22725243540D554876205341494132595E5D1A</lensinfo>";

    fn expected_lens() -> LensInfo {
        LensInfo {
            conversion_lens_id: 0,
            model: "F013".to_string(),
            serial: "0000190300007315".to_string(),
            versions: LensVersions {
                main0: [0x03, 0x01],
                main1: [0x02, 0x00],
                sub0: [0x01, 0x00],
                sub1: [0x01, 0x00],
                hw: [0x00, 0x00],
                conn: [0x01, 0x00],
            },
            capabilities: LensCapabilities {
                adj_focus: true,
                adj_ftm: true,
                adj_flimit_sw: false,
                adj_vc: true,
            },
            adj_vc_type: false,
            focus_focal_lengths: 1,
            focus_per_focal_length: 3,
            focus_limiter: FocusLimiter {
                count: 0,
                kind: 0,
                modes: [1; 4],
                partition: 53,
                init: [52; 4],
            },
            adj_focus_max: 20,
            adj_focus_min: -20,
            adj_focus_index: [45; 8],
            xml_data: None,
        }
    }

    fn lens_report(parsed: ParsedPayload) -> LensInfo {
        match parsed.details {
            Some(PayloadDetails::Status(StatusDetails {
                report: Some(StatusReport::Lens(lens)),
                ..
            })) => *lens,
            other => panic!("expected a lens report, got {other:?}"),
        }
    }

    #[test]
    fn captured_console_status_decodes() {
        let parsed = CommandRegistry::dispatch(
            &CONSOLE_STATUS_FRAME,
            Direction::Received,
            &DecodeContext::default(),
        );
        assert_eq!(
            ParsedPayload {
                cmd: Some(0xFA),
                human: Some("TAP-in Console Status: ".to_string()),
                details: Some(PayloadDetails::Status(StatusDetails {
                    target: Destination::Console,
                    report: Some(StatusReport::Console(ConsoleStatus {
                        firmware_version: 3,
                        mount_type: Some(MountType::Nikon),
                        mount_byte: 0x02,
                        hardware_version: 1,
                        connection_version: 1,
                    })),
                })),
            },
            parsed
        );
    }

    #[test]
    fn captured_lens_status_decodes_without_catalog() {
        let parsed = CommandRegistry::dispatch(
            &LENS_STATUS_FRAME,
            Direction::Received,
            &DecodeContext::default(),
        );
        assert_eq!(Some("Lens Status: ".to_string()), parsed.human);
        assert_eq!(expected_lens(), lens_report(parsed));
    }

    #[test]
    fn lens_status_merges_catalog_metadata_for_mount() {
        let adapter = AdapterInfo {
            connected: true,
            mount_type: Some(MountType::Nikon),
            ..AdapterInfo::default()
        };
        let catalog = HashMap::from([(
            "lensinfo_F013N0.xml".to_string(),
            F013_N0_XML.to_string(),
        )]);
        let context = DecodeContext::builder()
            .adapter(&adapter)
            .catalog(&catalog as &dyn LensCatalog)
            .build();

        let lens = lens_report(CommandRegistry::dispatch(
            &LENS_STATUS_FRAME,
            Direction::Received,
            &context,
        ));
        let xml = lens.xml_data.expect("catalog entry should be merged");
        assert_eq!("A013", xml.model);
        assert_eq!(
            "035E5241374047595E28645E5C22725243540D554876205341494132595E5D1A",
            xml.decrypt_key
        );
    }

    #[test]
    fn lens_status_tolerates_catalog_miss() {
        let adapter = AdapterInfo {
            mount_type: Some(MountType::Canon),
            ..AdapterInfo::default()
        };
        let catalog: HashMap<String, String> = HashMap::new();
        let context = DecodeContext::builder()
            .adapter(&adapter)
            .catalog(&catalog as &dyn LensCatalog)
            .build();
        let lens = lens_report(CommandRegistry::dispatch(
            &LENS_STATUS_FRAME,
            Direction::Received,
            &context,
        ));
        assert_eq!(None, lens.xml_data);
    }

    #[test]
    fn serial_stops_at_nul() {
        let mut frame = LENS_STATUS_FRAME;
        frame[6 + 1 + 19 + 6] = 0x00;
        let lens = lens_report(CommandRegistry::dispatch(
            &frame,
            Direction::Received,
            &DecodeContext::default(),
        ));
        assert_eq!("000019", lens.serial);
    }

    #[test]
    fn limiter_options_unpack_count_kind_and_modes() {
        let mut frame = LENS_STATUS_FRAME;
        frame[6 + 1 + 55] = 0b1010_0111;
        let limiter = lens_report(CommandRegistry::dispatch(
            &frame,
            Direction::Received,
            &DecodeContext::default(),
        ))
        .focus_limiter;
        assert_eq!(3, limiter.count);
        assert_eq!(1, limiter.kind);
        assert_eq!([1, 2, 1, 2], limiter.modes);
    }

    #[test]
    fn unknown_mount_is_not_fatal() {
        let mut frame = CONSOLE_STATUS_FRAME;
        frame[6 + 1 + 47] = 0x09;
        let parsed =
            CommandRegistry::dispatch(&frame, Direction::Received, &DecodeContext::default());
        assert_matches!(
            parsed.details,
            Some(PayloadDetails::Status(StatusDetails {
                report: Some(StatusReport::Console(ConsoleStatus {
                    mount_type: None,
                    mount_byte: 0x09,
                    ..
                })),
                ..
            }))
        );
    }

    #[test]
    fn outbound_status_request_has_no_details() {
        let frame = [0x0F, 0x02, 0x00, 0x00, 0x01, 0x00, 0xFA, 0x00, 0x00, 0xF0];
        let parsed = CommandRegistry::dispatch(&frame, Direction::Sent, &DecodeContext::default());
        assert_eq!(ParsedPayload::new(0xFA).with_human("Get Status"), parsed);
    }

    #[test]
    fn wrong_body_length_keeps_target_only() {
        let frame = [0x0F, 0x02, 0x01, 0x00, 0x03, 0x00, 0xFA, 0x01, 0x02, 0x00, 0x00, 0xF0];
        let parsed =
            CommandRegistry::dispatch(&frame, Direction::Received, &DecodeContext::default());
        assert_eq!(
            ParsedPayload::new(0xFA).with_details(PayloadDetails::Status(StatusDetails {
                target: Destination::Console,
                report: None,
            })),
            parsed
        );
    }

    #[test]
    fn console_status_updates_adapter_snapshot() {
        let status = StatusDecoder::decode_console(
            <&[u8; STATUS_BODY_LEN]>::try_from(&CONSOLE_STATUS_FRAME[7..92])
                .expect("captured body should be 85 bytes"),
        );
        let mut adapter = AdapterInfo {
            connected: true,
            ..AdapterInfo::default()
        };
        status.apply_to(&mut adapter);
        assert_eq!(
            AdapterInfo {
                connected: true,
                lens_attached: None,
                firmware_version: Some(3),
                hardware_version: Some(1),
                connection_version: Some(1),
                mount_type: Some(MountType::Nikon),
            },
            adapter
        );
    }
}
