mod decode_view;
mod frame_view;
mod painter;
mod progress;
mod table;

use std::io;

use serde::Serialize;

pub(crate) use self::decode_view::DecodeReportView;
pub(crate) use self::frame_view::FrameView;
pub(crate) use self::painter::Painter;
pub(crate) use self::progress::Progress;
pub(crate) use self::table::Table;

/// Writes `value` as pretty JSON followed by a newline.
pub(crate) fn write_json(out: &mut impl io::Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
