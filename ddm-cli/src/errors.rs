use ddm_core::DdmError;

#[derive(Debug, Fail)]
pub(crate) enum CliError {
    #[fail(display = "disk device manager error: {}", why)]
    Manager { why: DdmError },
    #[fail(display = "'{}' is not a valid create spec; expected offset:size:type", spec)]
    InvalidCreateSpec { spec: String },
    #[fail(display = "argument '{}' is not a number", arg)]
    ArgNaN { arg: String },
}

impl From<DdmError> for CliError {
    fn from(why: DdmError) -> CliError { CliError::Manager { why } }
}
