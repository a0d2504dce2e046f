//! Property XML rendering.
//!
//! Scalars are written as base64 text capped at `max_data` bytes, objects as a
//! `<property>` element with a page of children. An object's base link, when
//! present, is its first child and is named `<base>`.

pub mod name;

use crate::debugger::buffer::{Escaped, WireBuffer};
use crate::debugger::BufferError;
use crate::host::{Facets, ObjectRef, Value};
use name::{key_segment, BASE_NAME};
use std::rc::Rc;

/// Limits applied to a single property response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum scalar payload in bytes, 0 means unlimited.
    pub max_data: usize,
    /// Children per page.
    pub max_children: usize,
    /// Levels of children rendered below the requested property.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_data: 1024,
            max_children: 1000,
            max_depth: 2,
        }
    }
}

/// Longest prefix of `text` that fits into `max` bytes without splitting a character.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if max == 0 || text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub struct PropertyWriter<'a> {
    buf: &'a mut WireBuffer,
    limits: Limits,
}

impl<'a> PropertyWriter<'a> {
    pub fn new(buf: &'a mut WireBuffer, limits: Limits) -> Self {
        Self { buf, limits }
    }

    /// Write a top level property, `page` selects the page of its children.
    pub fn write(
        &mut self,
        name: &str,
        fullname: &str,
        value: &Value,
        facets: Facets,
        page: usize,
    ) -> Result<(), BufferError> {
        self.write_property(name, fullname, value, facets, page, self.limits.max_depth)
    }

    fn write_property(
        &mut self,
        name: &str,
        fullname: &str,
        value: &Value,
        facets: Facets,
        page: usize,
        depth_left: usize,
    ) -> Result<(), BufferError> {
        write!(
            self.buf,
            "<property name=\"{}\" fullname=\"{}\" type=\"{}\" facet=\"{}\"",
            Escaped(name),
            Escaped(fullname),
            value.type_name(),
            facets.render()
        )?;
        match value {
            Value::Missing => self.buf.write(b" size=\"0\"/>"),
            Value::Object(obj) => self.write_object(fullname, obj, page, depth_left),
            scalar => {
                let text = scalar.to_string();
                let shown = truncate_utf8(&text, self.limits.max_data);
                write!(self.buf, " size=\"{}\" encoding=\"base64\">", text.len())?;
                self.buf.write_base64(shown.as_bytes())?;
                self.buf.write(b"</property>")
            }
        }
    }

    fn write_object(
        &mut self,
        fullname: &str,
        obj: &ObjectRef,
        page: usize,
        depth_left: usize,
    ) -> Result<(), BufferError> {
        let (class_name, base, children) = {
            let obj = obj.borrow();
            let children: Vec<_> = obj
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (obj.class_name.clone(), obj.base.clone(), children)
        };
        let numchildren = children.len() + usize::from(base.is_some());
        let page_size = self.limits.max_children;

        write!(
            self.buf,
            " classname=\"{}\" address=\"{}\" size=\"0\" page=\"{page}\" pagesize=\"{page_size}\" children=\"{}\" numchildren=\"{numchildren}\"",
            Escaped(&class_name),
            Rc::as_ptr(obj) as usize,
            u8::from(numchildren > 0),
        )?;
        if depth_left == 0 || numchildren == 0 {
            return self.buf.write(b"/>");
        }
        self.buf.write(b">")?;

        let start = page.saturating_mul(page_size);
        let base_child = base.map(|b| (None, Value::Object(b)));
        let field_children = children.into_iter().map(|(k, v)| (Some(k), v));
        for (key, value) in base_child
            .into_iter()
            .chain(field_children)
            .skip(start)
            .take(page_size)
        {
            let (child_name, child_fullname) = match key {
                None => (BASE_NAME.to_string(), format!("{fullname}.{BASE_NAME}")),
                Some(key) => {
                    let segment = key_segment(&key);
                    let name = segment.strip_prefix('.').unwrap_or(&segment).to_string();
                    (name, format!("{fullname}{segment}"))
                }
            };
            self.write_property(
                &child_name,
                &child_fullname,
                &value,
                Facets::default(),
                0,
                depth_left - 1,
            )?;
        }
        self.buf.write(b"</property>")
    }
}
