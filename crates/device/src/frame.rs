/// Reserved bytes the typewriter controller sends for its function keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlByte {
    /// DEL (`0x7f`), sent by the BACKSPACE key. Cancels the active flow.
    Cancel,
    /// NAK (`0x15`), sent by the RELOC key. Opens the settings menu.
    OpenMenu,
    /// SYN (`0x16`), sent by the EXPR key. Prints the agenda now.
    GenerateAgenda,
    /// SUB (`0x1a`). Restores the factory Wi-Fi configuration.
    ResetNetwork,
}

impl ControlByte {
    /// Checked in this order when a frame carries more than one control byte.
    pub const ALL: [Self; 4] = [
        Self::Cancel,
        Self::OpenMenu,
        Self::GenerateAgenda,
        Self::ResetNetwork,
    ];

    pub const fn byte(self) -> u8 {
        match self {
            Self::Cancel => 0x7f,
            Self::OpenMenu => 0x15,
            Self::GenerateAgenda => 0x16,
            Self::ResetNetwork => 0x1a,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.byte() == byte)
    }
}

impl std::fmt::Display for ControlByte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cancel => "cancel",
            Self::OpenMenu => "open-menu",
            Self::GenerateAgenda => "generate-agenda",
            Self::ResetNetwork => "reset-network",
        })
    }
}

/// One raw unit of input from the device. Opaque to the queue.
#[derive(Clone, PartialEq, Eq)]
pub struct InputFrame(Vec<u8>);

impl InputFrame {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn control(control: ControlByte) -> Self {
        Self(vec![control.byte()])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The control byte this frame carries, if any.
    pub fn control_byte(&self) -> Option<ControlByte> {
        ControlByte::ALL
            .into_iter()
            .find(|c| self.0.contains(&c.byte()))
    }

    /// The frame as typed text: lossy UTF-8, control characters removed, trimmed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0)
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

impl From<&str> for InputFrame {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for InputFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Frames may carry passwords.
        f.debug_struct("InputFrame")
            .field("len", &self.0.len())
            .field("control", &self.control_byte())
            .finish()
    }
}
