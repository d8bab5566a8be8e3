//! Streaming element transforms.
//!
//! Everything outside the target element is copied event by event. Each
//! target element is read into an [`Element`] and handed to the transform,
//! so memory stays bounded by one element.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::error::Result;
use crate::xml::dom::{Element, is_blank};

/// What to do with a transformed element.
#[derive(Debug)]
pub enum Outcome {
    Keep(Element),
    /// Drop the element; surrounding whitespace stays.
    Bypass,
    /// Drop the element, close every open ancestor and stop.
    Break,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StreamStats {
    pub kept: usize,
    pub bypassed: usize,
    pub broke: bool,
}

struct Output<W: Write> {
    writer: Writer<W>,
    /// Whitespace seen since the last written event, held back so that a
    /// bypassed element does not leave two runs of indentation behind.
    pending: Option<Event<'static>>,
    after_bypass: bool,
}

impl<W: Write> Output<W> {
    fn flush_pending(&mut self) -> Result<()> {
        if let Some(event) = self.pending.take() {
            self.writer.write_event(event)?;
        }
        self.after_bypass = false;
        Ok(())
    }

    fn text(&mut self, event: Event<'static>) -> Result<()> {
        if self.after_bypass && self.pending.is_some() {
            self.after_bypass = false;
            return Ok(());
        }
        self.flush_pending()?;
        self.pending = Some(event);
        Ok(())
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.flush_pending()?;
        self.writer.write_event(event)?;
        Ok(())
    }
}

/// Copy `input` to `output`, passing every `target` element through `f`.
pub fn transform_stream<R, W, F>(input: R, output: W, target: &str, mut f: F) -> Result<StreamStats>
where
    R: BufRead,
    W: Write,
    F: FnMut(Element) -> Result<Outcome>,
{
    let mut reader = Reader::from_reader(input);
    let mut out = Output {
        writer: Writer::new(output),
        pending: None,
        after_bypass: false,
    };
    let mut open: Vec<BytesStart<'static>> = Vec::new();
    let mut stats = StreamStats::default();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        let element = match event {
            Event::Start(start) if start.name().as_ref() == target.as_bytes() => {
                Element::read_from(&mut reader, start)?
            }
            Event::Empty(start) if start.name().as_ref() == target.as_bytes() => {
                Element::from_empty(start)
            }
            Event::Start(start) => {
                out.write(Event::Start(start.borrow()))?;
                open.push(start);
                continue;
            }
            Event::End(end) => {
                open.pop();
                out.write(Event::End(end))?;
                continue;
            }
            Event::Text(text) => {
                if is_blank(&text) {
                    out.text(Event::Text(text))?;
                } else {
                    out.write(Event::Text(text))?;
                }
                continue;
            }
            Event::Eof => break,
            other => {
                out.write(other)?;
                continue;
            }
        };

        match f(element)? {
            Outcome::Keep(el) => {
                out.flush_pending()?;
                el.write_to(&mut out.writer)?;
                stats.kept += 1;
            }
            Outcome::Bypass => {
                out.after_bypass = true;
                stats.bypassed += 1;
            }
            Outcome::Break => {
                out.flush_pending()?;
                while let Some(start) = open.pop() {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    out.write(Event::End(BytesEnd::new(name)))?;
                }
                stats.broke = true;
                break;
            }
        }
    }
    out.flush_pending()?;
    debug!(kept = stats.kept, bypassed = stats.bypassed, broke = stats.broke, "stream done");
    Ok(stats)
}

/// Visit every `target` element read-only, in document order.
pub fn for_each_element<R, F>(input: R, target: &str, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(Element) -> Result<ControlFlow<()>>,
{
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        let element = match event {
            Event::Start(start) if start.name().as_ref() == target.as_bytes() => {
                Element::read_from(&mut reader, start)?
            }
            Event::Empty(start) if start.name().as_ref() == target.as_bytes() => {
                Element::from_empty(start)
            }
            Event::Eof => return Ok(()),
            _ => continue,
        };
        if f(element)?.is_break() {
            return Ok(());
        }
    }
}
