//! quick-xml plumbing shared by the .xlsx part readers.

use crate::error::DecodeError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("unknown entity reference '&{0};'")]
    UnknownEntity(String),

    #[error("attribute {name}=\"{value}\" has an unexpected value")]
    InvalidAttribute { name: String, value: String },
}

/// Pull reader that reports `<a/>` as a start and an end event, so the part
/// readers only ever match `Event::Start`.
pub(crate) struct XmlReader<R: BufRead> {
    inner: Reader<R>,
    scratch: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut inner = Reader::from_reader(source);
        let config = inner.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = false;
        config.check_comments = false;
        config.trim_text(false);

        XmlReader {
            inner,
            scratch: Vec::with_capacity(1024),
        }
    }

    pub(crate) fn next(&mut self) -> Result<Option<Event<'_>>, DecodeError> {
        self.scratch.clear();
        let event = self.inner.read_event_into(&mut self.scratch)?;
        Ok(match event {
            Event::Eof => None,
            event => Some(event),
        })
    }
}

pub(crate) trait XmlAttributeHelper<'a> {
    /// Attribute value with entities resolved.
    fn get_value(&self) -> Result<Cow<'a, str>, DecodeError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, DecodeError> {
        Ok(self.unescape_value()?)
    }
}

pub(crate) trait XmlNodeHelper<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, DecodeError>;

    /// Looks up `name` and parses it, failing when the value is present but
    /// malformed. An empty value counts as absent.
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, DecodeError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, DecodeError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => attribute.get_value().map(Some),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, DecodeError> {
        let Some(value) = self.get_attribute_value(name)?.filter(|value| !value.trim().is_empty()) else {
            return Ok(None);
        };
        match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(XmlError::InvalidAttribute {
                name: name.to_owned(),
                value: value.into_owned(),
            }
            .into()),
        }
    }
}

/// Accumulates character data that quick-xml splits into text and reference events.
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), DecodeError>;

    fn push_bytes_ref(&mut self, reference: &BytesRef) -> Result<(), DecodeError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), DecodeError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, reference: &BytesRef) -> Result<(), DecodeError> {
        let name = reference.xml_content()?;
        if let Some(code) = name.strip_prefix('#') {
            // Invalid code points are dropped rather than failing the cell.
            self.extend(char_reference(code)?);
            return Ok(());
        }
        let entity = resolve_xml_entity(&name).ok_or_else(|| XmlError::UnknownEntity(name.to_string()))?;
        self.push_str(entity);
        Ok(())
    }
}

fn char_reference(code: &str) -> Result<Option<char>, DecodeError> {
    let value = match code.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => code.parse::<u32>()?,
    };
    Ok(char::from_u32(value))
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
