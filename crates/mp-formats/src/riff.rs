//! Little-endian RIFF chunk building.

/// A chunk: id, declared length, body. The body is zero-padded to an even
/// length and the padded length is what gets declared.
pub(crate) fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let padded = body.len() + (body.len() & 1);
    let mut out = Vec::with_capacity(8 + padded);
    out.extend_from_slice(id);
    out.extend_from_slice(&(padded as u32).to_le_bytes());
    out.extend_from_slice(body);
    out.resize(8 + padded, 0);
    out
}

/// A `RIFF` or `LIST` chunk whose body is a form type followed by children.
pub(crate) fn list(id: &[u8; 4], form: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let len = 4 + children.iter().map(Vec::len).sum::<usize>();
    let mut body = Vec::with_capacity(len);
    body.extend_from_slice(form);
    for child in children {
        body.extend_from_slice(child);
    }
    chunk(id, &body)
}

/// Field writers for fixed-layout records.
pub(crate) trait RecordWriter {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);
    /// Text truncated or NUL-padded to exactly `width` bytes.
    fn put_text(&mut self, text: &str, width: usize);
}

impl RecordWriter for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn put_text(&mut self, text: &str, width: usize) {
        let bytes = text.as_bytes();
        let n = bytes.len().min(width);
        self.extend_from_slice(&bytes[..n]);
        self.resize(self.len() + width - n, 0);
    }
}
