// Copyright 2016 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Serialization and deserialization layer specialized for binary encoding.
//! To use it, implement `Writeable`/`Readable` and then use `serialize`/
//! `deserialize` on them as appropriate. This is the wire format hashed by
//! `Hashed::hash` and the format persisted by `txpool-store` (§4.H).

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, ErrorKind};

/// Every type that can be binary-serialized implements this, writing
/// directly to a `Writer`.
pub trait Writeable {
	/// Write `self` to the given writer.
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error>;
}

/// Every type that can be binary-deserialized implements this, reading
/// directly from a `Reader`.
pub trait Readable: Sized {
	/// Read an instance of `Self` from the given reader.
	fn read<R: Reader>(reader: &mut R) -> Result<Self, Error>;
}

/// Lower-level primitives a `Writeable` implementation composes.
pub trait Writer {
	fn write_u8(&mut self, n: u8) -> Result<(), Error>;
	fn write_u32(&mut self, n: u32) -> Result<(), Error>;
	fn write_u64(&mut self, n: u64) -> Result<(), Error>;
	fn write_i64(&mut self, n: i64) -> Result<(), Error>;
	fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;
	fn write_var_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
		self.write_u64(bytes.len() as u64)?;
		self.write_bytes(bytes)
	}
}

/// Lower-level primitives a `Readable` implementation composes.
pub trait Reader {
	fn read_u8(&mut self) -> Result<u8, Error>;
	fn read_u32(&mut self) -> Result<u32, Error>;
	fn read_u64(&mut self) -> Result<u64, Error>;
	fn read_i64(&mut self) -> Result<i64, Error>;
	fn read_fixed_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error>;
	fn read_var_bytes(&mut self) -> Result<Vec<u8>, Error> {
		let len = self.read_u64()?;
		self.read_fixed_bytes(len as usize)
	}
}

/// Maximum size accepted for a single length-prefixed read. Guards against a
/// corrupted length prefix causing an unbounded allocation.
const MAX_READ_LEN: u64 = 64 * 1024 * 1024;

struct BinWriter<'a, W: Write + 'a> {
	sink: &'a mut W,
}

impl<'a, W: Write> Writer for BinWriter<'a, W> {
	fn write_u8(&mut self, n: u8) -> Result<(), Error> {
		self.sink.write_u8(n).map_err(wrap_io)
	}
	fn write_u32(&mut self, n: u32) -> Result<(), Error> {
		self.sink.write_u32::<BigEndian>(n).map_err(wrap_io)
	}
	fn write_u64(&mut self, n: u64) -> Result<(), Error> {
		self.sink.write_u64::<BigEndian>(n).map_err(wrap_io)
	}
	fn write_i64(&mut self, n: i64) -> Result<(), Error> {
		self.sink.write_i64::<BigEndian>(n).map_err(wrap_io)
	}
	fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
		self.sink.write_all(bytes).map_err(wrap_io)
	}
}

struct BinReader<'a, R: Read + 'a> {
	source: &'a mut R,
}

impl<'a, R: Read> Reader for BinReader<'a, R> {
	fn read_u8(&mut self) -> Result<u8, Error> {
		self.source.read_u8().map_err(wrap_io)
	}
	fn read_u32(&mut self) -> Result<u32, Error> {
		self.source.read_u32::<BigEndian>().map_err(wrap_io)
	}
	fn read_u64(&mut self) -> Result<u64, Error> {
		self.source.read_u64::<BigEndian>().map_err(wrap_io)
	}
	fn read_i64(&mut self) -> Result<i64, Error> {
		self.source.read_i64::<BigEndian>().map_err(wrap_io)
	}
	fn read_fixed_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error> {
		if len as u64 > MAX_READ_LEN {
			return Err(ErrorKind::Ser(format!("read of {} bytes exceeds cap", len)).into());
		}
		let mut buf = vec![0u8; len];
		self.source.read_exact(&mut buf).map_err(wrap_io)?;
		Ok(buf)
	}
}

fn wrap_io(e: io::Error) -> Error {
	ErrorKind::Ser(e.to_string()).into()
}

/// Serializes a `Writeable` into an in-memory byte vector. This is the
/// canonical encoding used both for hashing (`Hashed::bytes`) and for
/// persistence (`txpool-store`).
pub fn ser_vec<W: Writeable>(thing: &W) -> Result<Vec<u8>, Error> {
	let mut vec = Vec::new();
	{
		let mut writer = BinWriter { sink: &mut vec };
		thing.write(&mut writer)?;
	}
	Ok(vec)
}

/// Deserializes a `Readable` from a byte slice.
pub fn deserialize<T: Readable>(mut bytes: &[u8]) -> Result<T, Error> {
	let mut reader = BinReader { source: &mut bytes };
	T::read(&mut reader)
}
