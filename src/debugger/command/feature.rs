use crate::debugger::buffer::Escaped;
use crate::debugger::command::{CommandArgs, CommandName, Outcome};
use crate::debugger::{Error, Session};
use std::borrow::Cow;
use std::str::FromStr;

pub struct Handler<'a> {
    session: &'a mut Session,
}

impl<'a> Handler<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    pub fn handle(self, command: CommandName, args: &CommandArgs) -> Result<Outcome, Error> {
        match command {
            CommandName::FeatureGet => self.feature_get(args),
            CommandName::FeatureSet => self.feature_set(args),
            _ => unreachable!("not a feature command: {command}"),
        }
    }

    /// Current value of a feature, `None` if unsupported. Command names are
    /// reported as supported with an empty value.
    fn feature(&self, name: &str) -> Option<Cow<'static, str>> {
        let config = &self.session.config;
        let limits = self.session.limits;
        let value: Cow<'static, str> = match name {
            "language_supports_threads" | "multiple_sessions" => "0".into(),
            "language_name" => config.language_name.clone().into(),
            "language_version" => config.language_version.clone().into(),
            "encoding" => "UTF-8".into(),
            "protocol_version" | "supports_async" => "1".into(),
            "breakpoint_types" => "line".into(),
            "max_data" => limits.max_data.to_string().into(),
            "max_children" => limits.max_children.to_string().into(),
            "max_depth" => limits.max_depth.to_string().into(),
            name if CommandName::from_str(name).is_ok() => "".into(),
            _ => return None,
        };
        Some(value)
    }

    fn feature_get(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("n")?;
        let name = args.require('n')?;
        let feature = self.feature(name);
        write!(
            self.session.response,
            "<response command=\"feature_get\" feature_name=\"{}\" supported=\"{}\" transaction_id=\"{}\">{}</response>",
            Escaped(name),
            u8::from(feature.is_some()),
            Escaped(&args.transaction_id),
            Escaped(feature.as_deref().unwrap_or_default())
        )?;
        Ok(Outcome::Responded)
    }

    fn feature_set(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("nv")?;
        let name = args.require('n')?;
        let value = args.require('v')?;
        let number = || value.trim().parse::<usize>().map_err(|_| Error::InvalidOptions);

        let success = match name {
            "max_data" => {
                self.session.limits.max_data = number()?;
                true
            }
            "max_children" => {
                self.session.limits.max_children = number()?;
                true
            }
            "max_depth" => {
                self.session.limits.max_depth = number()?;
                true
            }
            _ => false,
        };
        write!(
            self.session.response,
            "<response command=\"feature_set\" feature=\"{}\" success=\"{}\" transaction_id=\"{}\"/>",
            Escaped(name),
            u8::from(success),
            Escaped(&args.transaction_id)
        )?;
        Ok(Outcome::Responded)
    }
}

#[cfg(test)]
mod test {
    use crate::debugger::command::test::Harness;

    #[test]
    fn test_feature_get() {
        let mut h = Harness::new("x := 1\n").break_state();
        struct TestCase {
            name: &'static str,
            supported: u8,
            value: &'static str,
        }
        let cases = [
            TestCase {
                name: "encoding",
                supported: 1,
                value: "UTF-8",
            },
            TestCase {
                name: "supports_async",
                supported: 1,
                value: "1",
            },
            TestCase {
                name: "max_data",
                supported: 1,
                value: "1024",
            },
            TestCase {
                name: "breakpoint_set",
                supported: 1,
                value: "",
            },
            TestCase {
                name: "eval",
                supported: 0,
                value: "",
            },
        ];
        for case in cases {
            let resp = h.exec(&format!("feature_get -i 1 -n {}", case.name));
            assert_eq!(
                resp,
                format!(
                    "<response command=\"feature_get\" feature_name=\"{}\" supported=\"{}\" transaction_id=\"1\">{}</response>",
                    case.name, case.supported, case.value
                )
            );
        }
    }

    #[test]
    fn test_feature_set_limits() {
        let mut h = Harness::new("x := 1\n").break_state();
        assert!(h
            .exec("feature_set -i 1 -n max_children -v 5")
            .contains("success=\"1\""));
        assert_eq!(h.session.limits().max_children, 5);
        assert!(h
            .exec("feature_set -i 2 -n max_data -v 0")
            .contains("success=\"1\""));
        assert_eq!(h.session.limits().max_data, 0);
        assert!(h
            .exec("feature_set -i 3 -n show_hidden -v 1")
            .contains("success=\"0\""));
        assert!(h
            .exec("feature_set -i 4 -n max_depth -v deep")
            .contains("<error code=\"3\"/>"));
    }
}
