use embedded_io::{Read, Write};

use crate::hal::PwmControl;
use crate::protocol::dispatch::Dispatcher;
use crate::protocol::parser::CommandParser;
use crate::protocol::wire::Response;

/// Glues the parser and the dispatcher to a byte channel.
///
/// Single task context, one byte per poll; a zero-length read is the
/// "no data" sentinel. Every accepted frame produces exactly one response,
/// written back before the next byte is taken.
pub struct CommandPort<'a, P: PwmControl> {
    parser: CommandParser,
    dispatcher: Dispatcher<'a, P>,
}

impl<'a, P: PwmControl> CommandPort<'a, P> {
    pub fn new(dispatcher: Dispatcher<'a, P>) -> Self {
        Self {
            parser: CommandParser::new(),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a, P> {
        &self.dispatcher
    }

    /// Feeds one byte through the parser; returns the response if the byte
    /// completed a frame.
    pub fn feed(&mut self, byte: u8) -> Option<Response> {
        let frame = self.parser.push(byte)?;
        Some(self.dispatcher.handle(frame))
    }

    /// Reads at most one byte from the channel and writes back any response
    /// it produced. Call from the host-I/O loop.
    pub fn poll<S: Read + Write>(&mut self, serial: &mut S) -> Result<(), S::Error> {
        let mut byte = [0u8; 1];
        if serial.read(&mut byte)? == 0 {
            return Ok(());
        }
        if let Some(response) = self.feed(byte[0]) {
            serial.write_all(&response.encode())?;
        }
        Ok(())
    }
}
