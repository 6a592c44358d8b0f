use crate::constants::CRLF;

/// One protocol line ready for the wire, always CRLF-terminated.
#[derive(Debug, Clone, PartialEq)]
pub struct IrcLine {
    pub raw_line: String,
}
impl IrcLine {
    pub fn new(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        IrcLine {
            raw_line: format!("{line}{CRLF}"),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw_line.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_terminator_is_never_doubled() {
        assert_eq!(IrcLine::new("PING x").raw_line, "PING x\r\n");
        assert_eq!(IrcLine::new("PING x\r\n").raw_line, "PING x\r\n");
        assert_eq!(IrcLine::new("PING x\n").raw_line, "PING x\r\n");
    }
}
