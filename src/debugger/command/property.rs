use crate::debugger::buffer::{decode_base64, Escaped};
use crate::debugger::command::stack::{check_depth, context};
use crate::debugger::command::{CommandArgs, CommandName, Outcome};
use crate::debugger::property::name::{resolve, Binding, PropertyPath};
use crate::debugger::property::{truncate_utf8, PropertyWriter};
use crate::debugger::{Error, Session};
use crate::host::{Context, Facets, ScriptHost, Value};

/// Property commands also accept `-k` (key) and `-a` (address), both are ignored.
const LOOKUP_FLAGS: &str = "cdnmpka";

/// A property named by the client, resolved in its context.
struct Target {
    fullname: String,
    context: Context,
    depth: usize,
    path: PropertyPath,
}

impl Target {
    fn from_args<H: ScriptHost + ?Sized>(host: &H, args: &CommandArgs) -> Result<Self, Error> {
        let fullname = args.require('n')?.trim().to_string();
        let context = context(args)?;
        let depth = args.number::<usize>('d')?.unwrap_or(0);
        check_depth(host, depth)?;
        let path = PropertyPath::parse(&fullname)?;
        Ok(Self {
            fullname,
            context,
            depth,
            path,
        })
    }

    fn resolve<H: ScriptHost + ?Sized>(&self, host: &H) -> Result<Binding, Error> {
        resolve(host, &self.path, &self.fullname, self.context, self.depth)
    }
}

pub struct Handler<'a, H: ?Sized> {
    session: &'a mut Session,
    host: &'a mut H,
}

impl<'a, H: ScriptHost + ?Sized> Handler<'a, H> {
    pub fn new(session: &'a mut Session, host: &'a mut H) -> Self {
        Self { session, host }
    }

    pub fn handle(self, command: CommandName, args: &CommandArgs) -> Result<Outcome, Error> {
        match command {
            CommandName::PropertyGet => self.property_get(args),
            CommandName::PropertyValue => self.property_value(args),
            CommandName::PropertySet => self.property_set(args),
            CommandName::TypemapGet => self.typemap_get(args),
            _ => unreachable!("not a property command: {command}"),
        }
    }

    fn property_get(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags(LOOKUP_FLAGS)?;
        let target = Target::from_args(self.host, args)?;
        let page = args.number::<usize>('p')?.unwrap_or(0);
        let mut limits = self.session.limits;
        if let Some(max_data) = args.number::<usize>('m')? {
            limits.max_data = max_data;
        }

        let binding = target.resolve(self.host)?;
        let value = binding.value(&target.fullname)?;
        let facets = match &binding {
            Binding::Variable(var) => var.facets,
            _ => Facets::default(),
        };

        write!(
            self.session.response,
            "<response command=\"property_get\" transaction_id=\"{}\">",
            Escaped(&args.transaction_id)
        )?;
        PropertyWriter::new(&mut self.session.response, limits).write(
            &target.fullname,
            &target.fullname,
            &value,
            facets,
            page,
        )?;
        self.session.response.write(b"</response>")?;
        Ok(Outcome::Responded)
    }

    fn property_value(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags(LOOKUP_FLAGS)?;
        let target = Target::from_args(self.host, args)?;
        let max_data = args.number::<usize>('m')?.unwrap_or(0);
        let value = target.resolve(self.host)?.value(&target.fullname)?;

        let text = value.to_string();
        write!(
            self.session.response,
            "<response command=\"property_value\" type=\"{}\" size=\"{}\" encoding=\"base64\" transaction_id=\"{}\">",
            value.type_name(),
            text.len(),
            Escaped(&args.transaction_id)
        )?;
        self.session
            .response
            .write_base64(truncate_utf8(&text, max_data).as_bytes())?;
        self.session.response.write(b"</response>")?;
        Ok(Outcome::Responded)
    }

    fn property_set(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("cdntlka-")?;
        let target = Target::from_args(self.host, args)?;
        let data = args.data().ok_or(Error::InvalidOptions)?;
        let bytes = decode_base64(data).map_err(|_| Error::InvalidOptions)?;
        let text = String::from_utf8_lossy(&bytes);

        let value = match args.get('t').unwrap_or("string") {
            "string" => Some(Value::String(text.into_owned())),
            "integer" | "int" => text.trim().parse().ok().map(Value::Integer),
            "float" => text.trim().parse().ok().map(Value::Float),
            _ => None,
        };

        let success = match value {
            Some(value) if target.path.segments.is_empty() => self.host.assign_variable(
                &target.path.root,
                target.context,
                target.depth,
                value,
            ),
            Some(value) => target
                .resolve(self.host)?
                .assign(self.host, target.context, target.depth, value),
            None => false,
        };

        write!(
            self.session.response,
            "<response command=\"property_set\" success=\"{}\" transaction_id=\"{}\"/>",
            u8::from(success),
            Escaped(&args.transaction_id)
        )?;
        Ok(Outcome::Responded)
    }

    fn typemap_get(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("")?;
        write!(
            self.session.response,
            "<response command=\"typemap_get\" transaction_id=\"{}\" \
            xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
            xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\
            <map name=\"string\" type=\"string\" xsi:type=\"xsd:string\"/>\
            <map name=\"integer\" type=\"int\" xsi:type=\"xsd:long\"/>\
            <map name=\"float\" type=\"float\" xsi:type=\"xsd:double\"/>\
            <map name=\"object\" type=\"object\"/>\
            </response>",
            Escaped(&args.transaction_id)
        )?;
        Ok(Outcome::Responded)
    }
}
