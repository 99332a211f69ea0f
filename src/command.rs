//! Command Builder
//!
//! A `Command` is an ordered argument list plus the result slots the
//! executor fills in: `status`, `message` and the `data` list.
//!
//! ```
//! use rconnect::Command;
//!
//! let cmd = Command::new("SETEX").arg("session").arg(30).arg(&b"payload"[..]);
//! assert_eq!(cmd.len(), 4);
//! assert_eq!(&cmd.args()[2][..], b"30");
//! ```

use crate::error::{code, Error, ErrorKind, Result};
use crate::protocol::{encode, Reply};
use bytes::Bytes;

/// Converts a value into one command argument.
///
/// Integers are written as decimal text, floats with Rust's shortest
/// round-trip formatting and booleans as `1`/`0`.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for bool {
    fn to_arg(&self) -> Bytes {
        Bytes::from_static(if *self { b"1" } else { b"0" })
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

macro_rules! display_arg {
    ($($ty:ty),*) => {
        $(
            impl ToArg for $ty {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

display_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// One request and, after execution, its result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    args: Vec<Bytes>,
    status: i64,
    message: String,
    data: Vec<Bytes>,
}

impl Command {
    /// Starts a command with its name as the first argument.
    pub fn new(name: impl ToArg) -> Self {
        Self {
            args: vec![name.to_arg()],
            ..Self::default()
        }
    }

    /// Appends an argument (builder form).
    pub fn arg(mut self, value: impl ToArg) -> Self {
        self.push(value);
        self
    }

    /// Appends an argument in place.
    pub fn push(&mut self, value: impl ToArg) -> &mut Self {
        self.args.push(value.to_arg());
        self
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// The command name, lossily decoded.
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Serializes the arguments into request bytes.
    pub fn encode(&self) -> Bytes {
        encode(&self.args)
    }

    /// `OK` after a status reply, the value after an integer reply, else 0.
    pub fn status(&self) -> i64 {
        self.status
    }

    /// Status text, server error text, or the decimal integer reply.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Payloads of a bulk or array reply, in order.
    pub fn data(&self) -> &[Bytes] {
        &self.data
    }

    pub fn get(&self, idx: usize) -> Option<&Bytes> {
        self.data.get(idx)
    }

    pub fn take_data(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.data)
    }

    /// Drops arguments and results so the command can be rebuilt.
    pub fn clear(&mut self) {
        self.args.clear();
        self.reset_result();
    }

    pub(crate) fn reset_result(&mut self) {
        self.status = 0;
        self.message.clear();
        self.data.clear();
    }

    /// Stores a decoded reply. Error and null replies come back as `Err`.
    pub(crate) fn apply(&mut self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Status(text) => {
                self.status = i64::from(code::OK);
                self.message = text;
            }
            Reply::Error(text) => {
                self.message = text.clone();
                return Err(Error::new(ErrorKind::Fail, text));
            }
            Reply::Integer(value) => {
                self.status = value;
                self.message = value.to_string();
            }
            Reply::Bulk(payload) => self.data = vec![payload],
            Reply::Null => return Err(ErrorKind::NotFound.into()),
            Reply::Array(items) => self.data = items,
        }
        Ok(())
    }
}
