use std::fmt;

/// Which pass a batch, accumulator or report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Train,
    Val,
    Test,
}

impl Mode {
    /// Prefix of every scalar this mode emits (`tr_loss_step`, `val_f1`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            Mode::Train => "tr",
            Mode::Val => "val",
            Mode::Test => "test",
        }
    }

    /// Label used in report headers and console output.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Val => "val",
            Mode::Test => "test",
        }
    }

    /// Name of the change-class F1 scalar for this mode.
    pub fn change_f1_key(self) -> String {
        format!("{}_change_f1", self.prefix())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
