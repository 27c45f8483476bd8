pub mod cleanlogs;
pub mod start;
pub mod status;

pub const USAGE: &str = "\
Another Internet of Things Architecture (AiotA)
usage: aiota [command]
  start               Start the AiotA platform
  cleanlogs           [CAREFUL] Deletes all historical AiotA log files
  status              List registered platform processes
  -v, --version       Print AiotA's version
  help                You're staring at it
";
