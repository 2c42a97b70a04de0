use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "xfacs",
    about = "Publish a file's contents as the X11 clipboard selection",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// File whose contents are placed on the clipboard
    #[arg(value_name = "FILE", allow_hyphen_values = true)]
    pub file: PathBuf,
}

impl Cli {
    /// Parse `args` (program name first), accepting exactly one path.
    ///
    /// The count is checked before clap sees the arguments: clap drops
    /// `--` as an end-of-options marker, which would let two arguments
    /// through as one.
    pub fn from_args<I, T>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        if args.len() != 2 {
            return None;
        }
        Self::try_parse_from(args).ok()
    }
}
