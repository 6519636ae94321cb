use crate::{frame::Frame, Error};

#[derive(Debug, Default)]
pub struct Unknown {
    command_name: String,
}

impl Unknown {
    pub fn new(command_name: String) -> Self {
        Unknown { command_name }
    }

    /// Returns the name of the command the client attempted
    pub fn get_name(&self) -> &str {
        &self.command_name
    }

    /// Always a bad request; the handler reports it and keeps the
    /// connection open.
    pub fn apply(self) -> crate::Result<Frame> {
        Err(Error::bad_request("Bad command"))
    }
}
