// The execution trace is the primary output of the emulator, so it gets its
// own sink threaded through the stepper instead of going to a global logger.
// Anything diagnostic (as opposed to narrative) belongs to the `log` facade.

use std::fmt;
use std::io::{self, Write};

pub struct Trace {
    out: Box<dyn Write>,
}

impl Trace {
    pub fn new(out: Box<dyn Write>) -> Self {
        Trace { out }
    }
    pub fn stdout() -> Self {
        Trace { out: Box::new(io::stdout()) }
    }
    // Trace output is narration; an unwritable sink must not abort emulation.
    pub fn line(&mut self, args: fmt::Arguments) {
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_all(b"\n");
    }
}
