use std::{cell::RefCell, rc::Rc};

/// An in-memory writer whose clones all append to the same buffer, allowing the output of
/// an interpreter to be inspected after it has taken ownership of its writer.
#[derive(Debug, Clone, Default)]
pub struct CaptureOutput {
    into: Rc<RefCell<String>>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::io::Write for CaptureOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.into.borrow_mut().push_str(s);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Display for CaptureOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.into.borrow())
    }
}
