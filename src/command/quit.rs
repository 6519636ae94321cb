use super::FrameReader;

/// Terminal marker: the handler closes the connection instead of replying.
///
/// Arguments are ignored, matching the lenient behavior clients rely on
/// when they fire QUIT on the way out.
#[derive(Debug, Default)]
pub struct Quit;

impl Quit {
    pub fn new() -> Self {
        Quit
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        while reader.next().is_ok() {}

        Ok(Quit)
    }
}
