use std::ffi::OsStr;

use clap::{
    builder::{PossibleValue, TypedValueParser, ValueParserFactory},
    error::ErrorKind,
};

use crate::run::MAX_WORKERS;

/// Value of `-j`: let the CPU count decide, or run an explicit number of
/// workers, from 1 up to [`MAX_WORKERS`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Workers {
    #[default]
    Auto,
    Fixed(usize),
}

impl Workers {
    /// The override for [`DispatchConfig::parallelism`](crate::run::DispatchConfig::parallelism)
    pub fn parallelism(self) -> Option<usize> {
        match self {
            Workers::Auto => None,
            Workers::Fixed(n) => Some(n),
        }
    }
}

impl ValueParserFactory for Workers {
    type Parser = WorkersParser;

    fn value_parser() -> Self::Parser {
        WorkersParser
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkersParser;

impl TypedValueParser for WorkersParser {
    type Value = Workers;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let invalid = |msg: String| clap::Error::raw(ErrorKind::InvalidValue, msg).with_cmd(cmd);

        let Some(value) = value.to_str() else {
            return Err(clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd));
        };
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Workers::Auto);
        }
        match value.parse::<usize>() {
            Ok(n @ 1..=MAX_WORKERS) => Ok(Workers::Fixed(n)),
            Ok(n) => Err(invalid(format!(
                "invalid worker count {n}: between 1 and {MAX_WORKERS} workers can run at once\n"
            ))),
            Err(_) => Err(invalid(format!(
                "invalid worker count '{value}': expected `auto` or a number from 1 to {MAX_WORKERS}\n"
            ))),
        }
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        let auto = PossibleValue::new("auto").help("One worker per logical CPU, up to the cap");
        let fixed = PossibleValue::new("<number>").help("A specific number of workers");
        Some(Box::new([auto, fixed].into_iter()))
    }
}
