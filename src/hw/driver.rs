use std::collections::VecDeque;

use tracing::{debug, instrument, trace};

use super::model::{DecodeContext, FocusColumn, LensSettings};
use super::state::FollowUp;
use super::transport::Transport;
use crate::error::{DriverError, ProtocolError};
use crate::handlers::{
    Frame, FrameCodec, FrameDecoder, SequenceCounter, SettingsCodec, focus_number_to_byte,
};
use crate::message::{MessageSource, TapInMessage};
use crate::protocol::{Destination, Opcode};
use crate::utils::format_hex;

/// Consumer invoked once per message, in arrival order.
pub type MessageHandler = Box<dyn FnMut(TapInMessage) + Send>;

/// Frames commands onto a transport and turns inbound bytes into parsed messages.
///
/// Messages produced while no handler is installed are queued and flushed, in
/// order, when one is installed.
pub struct TapInDriver<T> {
    transport: T,
    decoder: FrameDecoder,
    sequence: SequenceCounter,
    handler: Option<MessageHandler>,
    pending: VecDeque<TapInMessage>,
    next_id: u64,
}

impl<T: Transport> TapInDriver<T> {
    /// Wraps an open transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::new(),
            sequence: SequenceCounter::new(),
            handler: None,
            pending: VecDeque::new(),
            next_id: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the driver and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Installs the consumer and delivers any queued messages to it first.
    pub fn set_handler(&mut self, handler: impl FnMut(TapInMessage) + Send + 'static) {
        let mut handler: MessageHandler = Box::new(handler);
        if !self.pending.is_empty() {
            debug!(queued = self.pending.len(), "flushing queued messages");
        }
        while let Some(message) = self.pending.pop_front() {
            handler(message);
        }
        self.handler = Some(handler);
    }

    /// Removes the consumer; later messages are queued again.
    pub fn clear_handler(&mut self) {
        self.handler = None;
    }

    /// Returns the number of messages waiting for a handler.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of inbound bytes still waiting to complete a frame.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.decoder.buffered_len()
    }

    /// Feeds one inbound chunk and returns the frames it completed, oldest first.
    ///
    /// Nothing is emitted here. Hand each frame to [`Self::deliver`] with a context taken
    /// after the previous frame was applied.
    #[instrument(skip(self, chunk), level = "trace", fields(chunk_len = chunk.len()))]
    pub fn receive(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.decoder.push(chunk)
    }

    /// Wraps one inbound frame as a console message and emits it.
    pub fn deliver(&mut self, frame: Frame, context: &DecodeContext<'_>) {
        let message =
            TapInMessage::new(self.take_id(), MessageSource::Console, frame.into_bytes(), context);
        self.emit(message);
    }

    /// Frames `payload` with the next sequence index and writes it.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload cannot be framed or the write fails.
    #[instrument(skip(self, payload), level = "debug", fields(payload = %format_hex(payload)))]
    pub async fn send_command(
        &mut self,
        destination: Destination,
        payload: &[u8],
    ) -> Result<(), DriverError> {
        let frame = FrameCodec::encode(self.sequence.peek(), destination, payload)?;
        self.write_and_echo(frame).await?;
        self.sequence.advance();
        Ok(())
    }

    /// Writes `bytes` unframed, e.g. for console diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), DriverError> {
        self.write_and_echo(bytes.to_vec()).await
    }

    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn power_on(&mut self) -> Result<(), DriverError> {
        self.send_command(Destination::Console, &[Opcode::PowerOn.byte(), 0x00])
            .await
    }

    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn power_off(&mut self) -> Result<(), DriverError> {
        self.send_command(Destination::Console, &[Opcode::PowerOff.byte()])
            .await
    }

    /// Requests the console status.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn get_status(&mut self) -> Result<(), DriverError> {
        self.send_command(Destination::Console, &[Opcode::GetStatus.byte()])
            .await
    }

    /// Requests the lens status.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn get_status_lens(&mut self) -> Result<(), DriverError> {
        self.send_command(Destination::Lens, &[Opcode::GetStatus.byte()])
            .await
    }

    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn check_lens_attached(&mut self) -> Result<(), DriverError> {
        self.send_command(Destination::Console, &[Opcode::IsLensAttached.byte()])
            .await
    }

    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn get_settings(&mut self) -> Result<(), DriverError> {
        self.send_command(Destination::Lens, &[Opcode::GetSettings.byte()])
            .await
    }

    /// Writes a full SET_SETTINGS payload built from `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn update_settings(&mut self, settings: &LensSettings) -> Result<(), DriverError> {
        let payload = SettingsCodec::encode(settings);
        self.send_command(Destination::Lens, &payload).await
    }

    /// Sets one signed focus value on a copy of `settings` and writes it to the lens.
    ///
    /// Returns the settings that were written.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FocusByte`] when `value` is outside `-128..=127` and
    /// [`ProtocolError::Driver`] when the write fails.
    pub async fn adjust_focus(
        &mut self,
        settings: &LensSettings,
        column: FocusColumn,
        row: usize,
        value: i32,
    ) -> Result<LensSettings, ProtocolError> {
        let mut updated = *settings;
        updated
            .focus_values
            .set(column, row, focus_number_to_byte(value)?);
        self.update_settings(&updated).await?;
        Ok(updated)
    }

    /// Issues the command a state follow-up asks for.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn execute(&mut self, follow_up: FollowUp) -> Result<(), DriverError> {
        debug!(%follow_up, "executing follow-up");
        match follow_up {
            FollowUp::CheckLensAttached => self.check_lens_attached().await,
            FollowUp::PowerOn => self.power_on().await,
            FollowUp::PowerOff => self.power_off().await,
            FollowUp::GetConsoleStatus => self.get_status().await,
            FollowUp::GetLensStatus => self.get_status_lens().await,
            FollowUp::GetSettings => self.get_settings().await,
        }
    }

    async fn write_and_echo(&mut self, bytes: Vec<u8>) -> Result<(), DriverError> {
        self.transport.write(&bytes).await?;
        trace!(bytes = %format_hex(&bytes), "wrote bytes");
        let message = TapInMessage::new(
            self.take_id(),
            MessageSource::Host,
            bytes,
            &DecodeContext::default(),
        );
        self.emit(message);
        Ok(())
    }

    fn emit(&mut self, message: TapInMessage) {
        if let Some(human) = &message.parsed.human {
            debug!(source = %message.source, id = message.id, "{human}");
        }
        match self.handler.as_mut() {
            Some(handler) => handler(message),
            None => self.pending.push_back(message),
        }
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl<T> std::fmt::Debug for TapInDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapInDriver")
            .field("decoder", &self.decoder)
            .field("sequence", &self.sequence)
            .field("handler", &self.handler.is_some())
            .field("pending", &self.pending.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
