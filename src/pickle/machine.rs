//! Pickle virtual machine
//!
//! Runs the opcode stream of protocols 0 through 5 without importing or
//! calling anything: globals stay names, `REDUCE` records its callable and
//! arguments, and only a short list of well-known reconstructors (copyreg,
//! codecs, builtin containers, numpy) is interpreted.
//!
//! Memoized items are moved into the memo and replaced on the stack by a
//! reference, so that `APPENDS`, `SETITEMS` or `BUILD` issued after `MEMOIZE`
//! mutate the shared object. References are copied out when the result is
//! materialized at `STOP`.

use std::collections::HashMap;

use tracing::debug;

use crate::pickle::error::{PickleError, Result};
use crate::pickle::numpy::{self, DType, NdArray, NumpyCall};
use crate::pickle::value::{Global, Object, Value};

const HIGHEST_PROTOCOL: u8 = 5;

/// Placeholder joblib writes in front of every inline array payload
const JOBLIB_ARRAY_WRAPPER: (&str, &str) = ("joblib.numpy_pickle", "NumpyArrayWrapper");

mod op {
    pub const MARK: u8 = b'(';
    pub const STOP: u8 = b'.';
    pub const POP: u8 = b'0';
    pub const POP_MARK: u8 = b'1';
    pub const DUP: u8 = b'2';
    pub const FLOAT: u8 = b'F';
    pub const INT: u8 = b'I';
    pub const BININT: u8 = b'J';
    pub const BININT1: u8 = b'K';
    pub const LONG: u8 = b'L';
    pub const BININT2: u8 = b'M';
    pub const NONE: u8 = b'N';
    pub const PERSID: u8 = b'P';
    pub const BINPERSID: u8 = b'Q';
    pub const REDUCE: u8 = b'R';
    pub const STRING: u8 = b'S';
    pub const BINSTRING: u8 = b'T';
    pub const SHORT_BINSTRING: u8 = b'U';
    pub const UNICODE: u8 = b'V';
    pub const BINUNICODE: u8 = b'X';
    pub const APPEND: u8 = b'a';
    pub const BUILD: u8 = b'b';
    pub const GLOBAL: u8 = b'c';
    pub const DICT: u8 = b'd';
    pub const EMPTY_DICT: u8 = b'}';
    pub const APPENDS: u8 = b'e';
    pub const GET: u8 = b'g';
    pub const BINGET: u8 = b'h';
    pub const INST: u8 = b'i';
    pub const LONG_BINGET: u8 = b'j';
    pub const LIST: u8 = b'l';
    pub const EMPTY_LIST: u8 = b']';
    pub const OBJ: u8 = b'o';
    pub const PUT: u8 = b'p';
    pub const BINPUT: u8 = b'q';
    pub const LONG_BINPUT: u8 = b'r';
    pub const SETITEM: u8 = b's';
    pub const TUPLE: u8 = b't';
    pub const EMPTY_TUPLE: u8 = b')';
    pub const SETITEMS: u8 = b'u';
    pub const BINFLOAT: u8 = b'G';

    // protocol 2
    pub const PROTO: u8 = 0x80;
    pub const NEWOBJ: u8 = 0x81;
    pub const EXT1: u8 = 0x82;
    pub const EXT2: u8 = 0x83;
    pub const EXT4: u8 = 0x84;
    pub const TUPLE1: u8 = 0x85;
    pub const TUPLE2: u8 = 0x86;
    pub const TUPLE3: u8 = 0x87;
    pub const NEWTRUE: u8 = 0x88;
    pub const NEWFALSE: u8 = 0x89;
    pub const LONG1: u8 = 0x8a;
    pub const LONG4: u8 = 0x8b;

    // protocol 3
    pub const BINBYTES: u8 = b'B';
    pub const SHORT_BINBYTES: u8 = b'C';

    // protocol 4
    pub const SHORT_BINUNICODE: u8 = 0x8c;
    pub const BINUNICODE8: u8 = 0x8d;
    pub const BINBYTES8: u8 = 0x8e;
    pub const EMPTY_SET: u8 = 0x8f;
    pub const ADDITEMS: u8 = 0x90;
    pub const FROZENSET: u8 = 0x91;
    pub const NEWOBJ_EX: u8 = 0x92;
    pub const STACK_GLOBAL: u8 = 0x93;
    pub const MEMOIZE: u8 = 0x94;
    pub const FRAME: u8 = 0x95;

    // protocol 5
    pub const BYTEARRAY8: u8 = 0x96;
    pub const NEXT_BUFFER: u8 = 0x97;
    pub const READONLY_BUFFER: u8 = 0x98;
}

/// Stack entry: a finished value, a memo reference, or a container that
/// may still be mutated
#[derive(Debug, Clone)]
enum Item {
    Value(Value),
    Ref(usize),
    List(Vec<Item>),
    Tuple(Vec<Item>),
    Dict(Vec<(Item, Item)>),
    Set(Vec<Item>),
    FrozenSet(Vec<Item>),
    Object(Box<Instance>),
}

impl Item {
    fn describe(&self) -> String {
        match self {
            Item::Value(value) => value.class_name(),
            Item::Ref(_) => "memo reference".to_string(),
            Item::List(_) => "list".to_string(),
            Item::Tuple(_) => "tuple".to_string(),
            Item::Dict(_) => "dict".to_string(),
            Item::Set(_) => "set".to_string(),
            Item::FrozenSet(_) => "frozenset".to_string(),
            Item::Object(instance) => instance.class.short_name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Instance {
    class: Global,
    args: Vec<Value>,
    state: Option<Item>,
    items: Vec<Item>,
    entries: Vec<(Item, Item)>,
    /// Created by numpy's `_reconstruct`; `BUILD` turns it into an array
    pending_array: bool,
}

impl Instance {
    fn new(class: Global, args: Vec<Value>) -> Self {
        Self {
            class,
            args,
            state: None,
            items: Vec::new(),
            entries: Vec::new(),
            pending_array: false,
        }
    }
}

/// Decoder for one pickle stream held in memory
pub struct Unpickler<'a> {
    input: &'a [u8],
    pos: usize,
    /// Start of the opcode being executed, for error reports
    offset: usize,
    stack: Vec<Item>,
    metastack: Vec<Vec<Item>>,
    memo: HashMap<usize, Item>,
    protocol: u8,
    inline_arrays: usize,
}

impl<'a> Unpickler<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            offset: 0,
            stack: Vec::new(),
            metastack: Vec::new(),
            memo: HashMap::new(),
            protocol: 0,
            inline_arrays: 0,
        }
    }

    /// Protocol announced by the stream (0 when it has no `PROTO` opcode)
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of joblib array payloads read from the stream
    pub fn inline_arrays(&self) -> usize {
        self.inline_arrays
    }

    /// Run until `STOP` and return the object on top of the stack.
    pub fn load(&mut self) -> Result<Value> {
        if self.pos >= self.input.len() {
            return Err(PickleError::Empty);
        }

        loop {
            self.offset = self.pos;
            let opcode = self.read_u8()?;
            if opcode == op::STOP {
                let item = self.pop()?;
                let value = self.materialize(&item)?;
                debug!(
                    protocol = self.protocol,
                    bytes = self.pos,
                    memo = self.memo.len(),
                    inline_arrays = self.inline_arrays,
                    "Pickle stream decoded"
                );
                return Ok(value);
            }
            self.step(opcode)?;
        }
    }

    fn step(&mut self, opcode: u8) -> Result<()> {
        match opcode {
            op::PROTO => {
                let protocol = self.read_u8()?;
                if protocol > HIGHEST_PROTOCOL {
                    return Err(PickleError::UnsupportedProtocol(protocol));
                }
                self.protocol = protocol;
            }
            op::FRAME => {
                // Frames only bound read-ahead; the stream stays contiguous.
                self.read_u64()?;
            }

            // Stack manipulation
            op::MARK => {
                let stack = std::mem::take(&mut self.stack);
                self.metastack.push(stack);
            }
            op::POP => {
                if self.stack.pop().is_none() {
                    self.pop_mark()?;
                }
            }
            op::POP_MARK => {
                self.pop_mark()?;
            }
            op::DUP => {
                let top = self.top()?.clone();
                self.stack.push(top);
            }

            // Atoms
            op::NONE => self.push_value(Value::None),
            op::NEWTRUE => self.push_value(Value::Bool(true)),
            op::NEWFALSE => self.push_value(Value::Bool(false)),
            op::INT => {
                let line = self.read_line_str("INT")?;
                let value = match line {
                    "00" => Value::Bool(false),
                    "01" => Value::Bool(true),
                    digits => parse_decimal(digits).ok_or_else(|| invalid("INT", digits))?,
                };
                self.push_value(value);
            }
            op::BININT => {
                let n = i32::from_le_bytes(self.read_array()?);
                self.push_value(Value::Int(i64::from(n)));
            }
            op::BININT1 => {
                let n = self.read_u8()?;
                self.push_value(Value::Int(i64::from(n)));
            }
            op::BININT2 => {
                let n = u16::from_le_bytes(self.read_array()?);
                self.push_value(Value::Int(i64::from(n)));
            }
            op::LONG => {
                let line = self.read_line_str("LONG")?;
                let digits = line.strip_suffix('L').unwrap_or(line);
                let value = parse_decimal(digits).ok_or_else(|| invalid("LONG", line))?;
                self.push_value(value);
            }
            op::LONG1 => {
                let len = usize::from(self.read_u8()?);
                let bytes = self.read_bytes(len)?;
                self.push_value(decode_long(bytes));
            }
            op::LONG4 => {
                let len = self.read_signed_len("LONG4")?;
                let bytes = self.read_bytes(len)?;
                self.push_value(decode_long(bytes));
            }
            op::FLOAT => {
                let line = self.read_line_str("FLOAT")?;
                let value: f64 = line.trim().parse().map_err(|_| invalid("FLOAT", line))?;
                self.push_value(Value::Float(value));
            }
            op::BINFLOAT => {
                let value = f64::from_be_bytes(self.read_array()?);
                self.push_value(Value::Float(value));
            }

            // Text and binary data
            op::STRING => {
                let line = self.read_line()?;
                let bytes = unquote(line).ok_or_else(|| invalid("STRING", &String::from_utf8_lossy(line)))?;
                self.push_value(Value::Str(latin1(&bytes)));
            }
            op::BINSTRING => {
                let len = self.read_signed_len("BINSTRING")?;
                let bytes = self.read_bytes(len)?;
                self.push_value(Value::Str(latin1(bytes)));
            }
            op::SHORT_BINSTRING => {
                let len = usize::from(self.read_u8()?);
                let bytes = self.read_bytes(len)?;
                self.push_value(Value::Str(latin1(bytes)));
            }
            op::UNICODE => {
                let line = self.read_line()?;
                self.push_value(Value::Str(raw_unicode_escape(line)));
            }
            op::BINUNICODE => {
                let len = self.read_u32()? as usize;
                self.push_utf8(len)?;
            }
            op::SHORT_BINUNICODE => {
                let len = usize::from(self.read_u8()?);
                self.push_utf8(len)?;
            }
            op::BINUNICODE8 => {
                let len = self.read_long_len()?;
                self.push_utf8(len)?;
            }
            op::BINBYTES => {
                let len = self.read_u32()? as usize;
                let bytes = self.read_bytes(len)?;
                self.push_value(Value::Bytes(bytes.to_vec()));
            }
            op::SHORT_BINBYTES => {
                let len = usize::from(self.read_u8()?);
                let bytes = self.read_bytes(len)?;
                self.push_value(Value::Bytes(bytes.to_vec()));
            }
            op::BINBYTES8 => {
                let len = self.read_long_len()?;
                let bytes = self.read_bytes(len)?;
                self.push_value(Value::Bytes(bytes.to_vec()));
            }
            op::BYTEARRAY8 => {
                let len = self.read_long_len()?;
                let bytes = self.read_bytes(len)?;
                self.push_value(Value::ByteArray(bytes.to_vec()));
            }
            op::READONLY_BUFFER => {
                self.top()?;
            }

            // Containers
            op::EMPTY_LIST => self.stack.push(Item::List(Vec::new())),
            op::LIST => {
                let items = self.pop_mark()?;
                self.stack.push(Item::List(items));
            }
            op::APPEND => {
                let item = self.pop()?;
                self.extend_top("APPEND", vec![item])?;
            }
            op::APPENDS => {
                let items = self.pop_mark()?;
                self.extend_top("APPENDS", items)?;
            }
            op::EMPTY_TUPLE => self.stack.push(Item::Tuple(Vec::new())),
            op::TUPLE => {
                let items = self.pop_mark()?;
                self.stack.push(Item::Tuple(items));
            }
            op::TUPLE1 | op::TUPLE2 | op::TUPLE3 => {
                let arity = usize::from(opcode - op::TUPLE1 + 1);
                let items = self.pop_n(arity)?;
                self.stack.push(Item::Tuple(items));
            }
            op::EMPTY_DICT => self.stack.push(Item::Dict(Vec::new())),
            op::DICT => {
                let items = self.pop_mark()?;
                let entries = self.pairs("DICT", items)?;
                self.stack.push(Item::Dict(entries));
            }
            op::SETITEM => {
                let value = self.pop()?;
                let key = self.pop()?;
                self.set_items("SETITEM", vec![(key, value)])?;
            }
            op::SETITEMS => {
                let items = self.pop_mark()?;
                let entries = self.pairs("SETITEMS", items)?;
                self.set_items("SETITEMS", entries)?;
            }
            op::EMPTY_SET => self.stack.push(Item::Set(Vec::new())),
            op::ADDITEMS => {
                let items = self.pop_mark()?;
                self.add_items(items)?;
            }
            op::FROZENSET => {
                let items = self.pop_mark()?;
                self.stack.push(Item::FrozenSet(items));
            }

            // Memo
            op::PUT => {
                let key = self.read_line_key("PUT")?;
                self.memoize(key)?;
            }
            op::BINPUT => {
                let key = usize::from(self.read_u8()?);
                self.memoize(key)?;
            }
            op::LONG_BINPUT => {
                let key = self.read_u32()? as usize;
                self.memoize(key)?;
            }
            op::MEMOIZE => {
                let key = self.memo.len();
                self.memoize(key)?;
            }
            op::GET => {
                let key = self.read_line_key("GET")?;
                self.fetch(key)?;
            }
            op::BINGET => {
                let key = usize::from(self.read_u8()?);
                self.fetch(key)?;
            }
            op::LONG_BINGET => {
                let key = self.read_u32()? as usize;
                self.fetch(key)?;
            }

            // Classes and instances
            op::GLOBAL => {
                let module = self.read_line_str("GLOBAL")?;
                let name = self.read_line_str("GLOBAL")?;
                self.push_value(Value::Global(Global::from_stream(module, name)));
            }
            op::STACK_GLOBAL => {
                let name = self.pop()?;
                let module = self.pop()?;
                let name = self.materialize(&name)?;
                let module = self.materialize(&module)?;
                match (module.as_str(), name.as_str()) {
                    (Some(module), Some(name)) => {
                        let global = Global::from_stream(module, name);
                        self.push_value(Value::Global(global));
                    }
                    _ => return Err(unexpected_value("STACK_GLOBAL", "module and name strings", &module)),
                }
            }
            op::REDUCE => {
                let args = self.pop()?;
                let callable = self.pop()?;
                let item = self.reduce(&callable, &args)?;
                self.stack.push(item);
            }
            op::BUILD => {
                let state = self.pop()?;
                self.build(state)?;
            }
            op::NEWOBJ => {
                let args = self.pop()?;
                let class = self.pop()?;
                let item = self.instantiate("NEWOBJ", &class, &args)?;
                self.stack.push(item);
            }
            op::NEWOBJ_EX => {
                let _kwargs = self.pop()?;
                let args = self.pop()?;
                let class = self.pop()?;
                let item = self.instantiate("NEWOBJ_EX", &class, &args)?;
                self.stack.push(item);
            }
            op::OBJ => {
                let mut items = self.pop_mark()?;
                if items.is_empty() {
                    return Err(PickleError::StackUnderflow(self.offset));
                }
                let class = items.remove(0);
                let item = self.instantiate("OBJ", &class, &Item::Tuple(items))?;
                self.stack.push(item);
            }
            op::INST => {
                let module = self.read_line_str("INST")?;
                let name = self.read_line_str("INST")?;
                let class = Global::from_stream(module, name);
                let args = self.pop_mark()?;
                let args = args
                    .iter()
                    .map(|arg| self.materialize(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.stack.push(Item::Object(Box::new(Instance::new(class, args))));
            }

            op::PERSID => return Err(self.unsupported("PERSID")),
            op::BINPERSID => return Err(self.unsupported("BINPERSID")),
            op::EXT1 => return Err(self.unsupported("EXT1")),
            op::EXT2 => return Err(self.unsupported("EXT2")),
            op::EXT4 => return Err(self.unsupported("EXT4")),
            op::NEXT_BUFFER => return Err(self.unsupported("NEXT_BUFFER")),

            other => {
                return Err(PickleError::UnknownOpcode {
                    opcode: other,
                    offset: self.offset,
                })
            }
        }
        Ok(())
    }

    // Reading

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let input = self.input;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= input.len())
            .ok_or(PickleError::Truncated)?;
        let bytes = &input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_signed_len(&mut self, kind: &'static str) -> Result<usize> {
        let len = i32::from_le_bytes(self.read_array()?);
        usize::try_from(len).map_err(|_| invalid(kind, &len.to_string()))
    }

    fn read_long_len(&mut self) -> Result<usize> {
        usize::try_from(self.read_u64()?).map_err(|_| PickleError::Truncated)
    }

    /// Line argument of a text opcode, without its newline
    fn read_line(&mut self) -> Result<&'a [u8]> {
        let input = self.input;
        let rest = &input[self.pos..];
        let end = rest
            .iter()
            .position(|b| *b == b'\n')
            .ok_or(PickleError::Truncated)?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn read_line_str(&mut self, kind: &'static str) -> Result<&'a str> {
        let line = self.read_line()?;
        std::str::from_utf8(line).map_err(|_| invalid(kind, &String::from_utf8_lossy(line)))
    }

    fn read_line_key(&mut self, kind: &'static str) -> Result<usize> {
        let line = self.read_line_str(kind)?;
        line.trim().parse().map_err(|_| invalid(kind, line))
    }

    fn push_utf8(&mut self, len: usize) -> Result<()> {
        let bytes = self.read_bytes(len)?;
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.push_value(Value::Str(text));
        Ok(())
    }

    // Stack

    fn push_value(&mut self, value: Value) {
        self.stack.push(Item::Value(value));
    }

    fn pop(&mut self) -> Result<Item> {
        self.stack
            .pop()
            .ok_or(PickleError::StackUnderflow(self.offset))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Item>> {
        if self.stack.len() < n {
            return Err(PickleError::StackUnderflow(self.offset));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }

    fn top(&self) -> Result<&Item> {
        self.stack
            .last()
            .ok_or(PickleError::StackUnderflow(self.offset))
    }

    fn pop_mark(&mut self) -> Result<Vec<Item>> {
        let previous = self
            .metastack
            .pop()
            .ok_or(PickleError::MissingMark(self.offset))?;
        Ok(std::mem::replace(&mut self.stack, previous))
    }

    fn pairs(&self, op: &'static str, items: Vec<Item>) -> Result<Vec<(Item, Item)>> {
        if items.len() % 2 != 0 {
            return Err(PickleError::UnexpectedValue {
                op,
                expected: "key/value pairs",
                found: format!("{} items", items.len()),
            });
        }
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut items = items.into_iter();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// The stack top, followed through the memo when it is a reference
    fn top_target(&mut self) -> Result<&mut Item> {
        let Self {
            stack,
            memo,
            offset,
            ..
        } = self;
        let top = stack
            .last_mut()
            .ok_or(PickleError::StackUnderflow(*offset))?;
        let mut key = match top {
            Item::Ref(key) => *key,
            other => return Ok(other),
        };
        let mut resolved = false;
        for _ in 0..=memo.len() {
            match memo.get(&key) {
                Some(Item::Ref(next)) => key = *next,
                Some(_) => {
                    resolved = true;
                    break;
                }
                None => return Err(PickleError::MissingMemo(key)),
            }
        }
        if !resolved {
            return Err(PickleError::Recursive(key));
        }
        memo.get_mut(&key).ok_or(PickleError::MissingMemo(key))
    }

    fn extend_top(&mut self, op: &'static str, items: Vec<Item>) -> Result<()> {
        match self.top_target()? {
            Item::List(list) => list.extend(items),
            Item::Object(instance) => instance.items.extend(items),
            other => return Err(unexpected(op, "a list", other)),
        }
        Ok(())
    }

    fn set_items(&mut self, op: &'static str, entries: Vec<(Item, Item)>) -> Result<()> {
        match self.top_target()? {
            Item::Dict(dict) => dict.extend(entries),
            Item::Object(instance) => instance.entries.extend(entries),
            other => return Err(unexpected(op, "a dict", other)),
        }
        Ok(())
    }

    fn add_items(&mut self, items: Vec<Item>) -> Result<()> {
        match self.top_target()? {
            Item::Set(set) => set.extend(items),
            Item::Object(instance) => instance.items.extend(items),
            other => return Err(unexpected("ADDITEMS", "a set", other)),
        }
        Ok(())
    }

    // Memo

    fn memoize(&mut self, key: usize) -> Result<()> {
        let top = self
            .stack
            .last_mut()
            .ok_or(PickleError::StackUnderflow(self.offset))?;
        if let Item::Ref(existing) = *top {
            // Already shared: alias the new key unless it is the same one.
            if existing != key {
                self.memo.insert(key, Item::Ref(existing));
            }
        } else {
            let item = std::mem::replace(top, Item::Ref(key));
            self.memo.insert(key, item);
        }
        Ok(())
    }

    fn fetch(&mut self, key: usize) -> Result<()> {
        if !self.memo.contains_key(&key) {
            return Err(PickleError::MissingMemo(key));
        }
        self.stack.push(Item::Ref(key));
        Ok(())
    }

    /// Copy an item out into a standalone value, resolving memo references.
    fn materialize(&self, item: &Item) -> Result<Value> {
        self.materialize_inner(item, &mut Vec::new())
    }

    fn materialize_inner(&self, item: &Item, visiting: &mut Vec<usize>) -> Result<Value> {
        let value = match item {
            Item::Value(value) => value.clone(),
            Item::Ref(key) => {
                if visiting.contains(key) {
                    return Err(PickleError::Recursive(*key));
                }
                let target = self.memo.get(key).ok_or(PickleError::MissingMemo(*key))?;
                visiting.push(*key);
                let value = self.materialize_inner(target, visiting);
                visiting.pop();
                value?
            }
            Item::List(items) => Value::List(self.materialize_all(items, visiting)?),
            Item::Tuple(items) => Value::Tuple(self.materialize_all(items, visiting)?),
            Item::Set(items) => Value::Set(self.materialize_all(items, visiting)?),
            Item::FrozenSet(items) => Value::FrozenSet(self.materialize_all(items, visiting)?),
            Item::Dict(entries) => Value::Dict(self.materialize_pairs(entries, visiting)?),
            Item::Object(instance) => {
                let state = match &instance.state {
                    Some(state) => Some(self.materialize_inner(state, visiting)?),
                    None => None,
                };
                Value::Object(Box::new(Object {
                    class: instance.class.clone(),
                    args: instance.args.clone(),
                    state,
                    items: self.materialize_all(&instance.items, visiting)?,
                    entries: self.materialize_pairs(&instance.entries, visiting)?,
                }))
            }
        };
        Ok(value)
    }

    fn materialize_all(&self, items: &[Item], visiting: &mut Vec<usize>) -> Result<Vec<Value>> {
        items
            .iter()
            .map(|item| self.materialize_inner(item, visiting))
            .collect()
    }

    fn materialize_pairs(
        &self,
        entries: &[(Item, Item)],
        visiting: &mut Vec<usize>,
    ) -> Result<Vec<(Value, Value)>> {
        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            out.push((
                self.materialize_inner(key, visiting)?,
                self.materialize_inner(value, visiting)?,
            ));
        }
        Ok(out)
    }

    fn materialize_args(&self, op: &'static str, args: &Item) -> Result<Vec<Value>> {
        match self.materialize(args)? {
            Value::Tuple(args) | Value::List(args) => Ok(args),
            other => Err(unexpected_value(op, "an argument tuple", &other)),
        }
    }

    // Objects

    fn instantiate(&self, op: &'static str, class: &Item, args: &Item) -> Result<Item> {
        let class = match self.materialize(class)? {
            Value::Global(class) => class,
            other => return Err(unexpected_value(op, "a class", &other)),
        };
        let args = self.materialize_args(op, args)?;
        Ok(Item::Object(Box::new(Instance::new(class, args))))
    }

    fn reduce(&self, callable: &Item, args: &Item) -> Result<Item> {
        let callable = match self.materialize(callable)? {
            Value::Global(global) => global,
            other => return Err(unexpected_value("REDUCE", "a global callable", &other)),
        };
        let args = self.materialize_args("REDUCE", args)?;

        if let Some(call) = NumpyCall::identify(&callable) {
            return numpy_call(call, args);
        }

        let value = match (callable.module.as_str(), callable.name.as_str()) {
            ("copyreg", "_reconstructor") | ("copyreg", "__newobj__") => {
                let mut args = args.into_iter();
                let class = match args.next() {
                    Some(Value::Global(class)) => class,
                    Some(other) => return Err(unexpected_value("REDUCE", "a class", &other)),
                    None => return Err(PickleError::StackUnderflow(self.offset)),
                };
                let args = if callable.name == "__newobj__" {
                    args.collect()
                } else {
                    Vec::new()
                };
                return Ok(Item::Object(Box::new(Instance::new(class, args))));
            }
            ("_codecs", "encode") => {
                let text = args.first().and_then(Value::as_str).unwrap_or_default();
                let encoding = args.get(1).and_then(Value::as_str).unwrap_or("utf-8");
                Value::Bytes(encode(text, encoding)?)
            }
            ("builtins", "bytes") | ("builtins", "bytearray") => {
                let bytes = match args.as_slice() {
                    [] => Vec::new(),
                    [Value::Str(text), Value::Str(encoding), ..] => encode(text, encoding)?,
                    [payload, ..] => numpy::payload_bytes(payload)
                        .ok_or_else(|| unexpected_value("REDUCE", "bytes", payload))?,
                };
                if callable.name == "bytes" {
                    Value::Bytes(bytes)
                } else {
                    Value::ByteArray(bytes)
                }
            }
            ("builtins", name @ ("set" | "frozenset" | "list" | "tuple" | "dict")) => {
                let items = match args.first() {
                    None => Vec::new(),
                    Some(Value::List(items) | Value::Tuple(items) | Value::Set(items) | Value::FrozenSet(items)) => {
                        items.clone()
                    }
                    Some(other) => return Err(unexpected_value("REDUCE", "an iterable", other)),
                };
                match name {
                    "set" => Value::Set(items),
                    "frozenset" => Value::FrozenSet(items),
                    "list" => Value::List(items),
                    "tuple" => Value::Tuple(items),
                    _ => Value::Dict(
                        items
                            .into_iter()
                            .map(|pair| match pair.as_sequence() {
                                Some([key, value]) => Ok((key.clone(), value.clone())),
                                _ => Err(unexpected_value("REDUCE", "key/value pairs", &pair)),
                            })
                            .collect::<Result<Vec<_>>>()?,
                    ),
                }
            }
            _ => return Ok(Item::Object(Box::new(Instance::new(callable, args)))),
        };
        Ok(Item::Value(value))
    }

    fn build(&mut self, state: Item) -> Result<()> {
        let (class, pending_array) = match self.top_target()? {
            Item::Object(instance) => (instance.class.clone(), instance.pending_array),
            other => return Err(unexpected("BUILD", "an object", other)),
        };

        if pending_array {
            let state = self.materialize(&state)?;
            let array = array_from_state(&state)?;
            *self.top_target()? = Item::Value(Value::Array(array));
            return Ok(());
        }

        if let Item::Object(instance) = self.top_target()? {
            instance.state = Some(match (instance.state.take(), state) {
                (Some(Item::Dict(mut merged)), Item::Dict(update)) => {
                    merged.extend(update);
                    Item::Dict(merged)
                }
                (_, state) => state,
            });
        }

        if class.is(JOBLIB_ARRAY_WRAPPER.0, JOBLIB_ARRAY_WRAPPER.1) {
            // joblib swaps the wrapper for the array on the stack only; the
            // memo keeps the wrapper.
            let wrapper = self.pop()?;
            let wrapper = self.materialize(&wrapper)?;
            let array = self.read_inline_array(&wrapper)?;
            self.push_value(Value::Array(array));
        }
        Ok(())
    }

    /// Read the array payload joblib writes right after a wrapper's `BUILD`.
    fn read_inline_array(&mut self, wrapper: &Value) -> Result<NdArray> {
        let wrapper = match wrapper {
            Value::Object(wrapper) => wrapper,
            other => return Err(unexpected_value("NumpyArrayWrapper", "an object", other)),
        };
        let field = |name: &str| {
            wrapper.attr(name).ok_or_else(|| PickleError::UnexpectedValue {
                op: "NumpyArrayWrapper",
                expected: "shape, order and dtype attributes",
                found: format!("no {name}"),
            })
        };
        let shape = numpy::shape_from_value(field("shape")?)?;
        let fortran_order = field("order")?.as_str() == Some("F");
        let dtype = DType::from_value(field("dtype")?)?;

        if dtype.kind == 'O' {
            // Object arrays are written as a nested pickle stream.
            let input = self.input;
            let mut nested = Unpickler::new(&input[self.pos..]);
            let value = nested.load()?;
            self.pos += nested.position();
            return match value {
                Value::Array(array) => Ok(array),
                other => Err(unexpected_value("NumpyArrayWrapper", "an object array", &other)),
            };
        }

        if let Some(Value::Int(_)) = wrapper.attr("numpy_array_alignment_bytes") {
            let padding = usize::from(self.read_u8()?);
            self.read_bytes(padding)?;
        }

        let len = numpy::element_count(&shape)?
            .checked_mul(dtype.itemsize)
            .ok_or(PickleError::ArrayTooBig)?;
        let raw = self.read_bytes(len)?;
        self.inline_arrays += 1;
        debug!(shape = ?shape, dtype = %dtype.scalar_name(), bytes = len, "Read inline array payload");

        NdArray::from_bytes(dtype, shape, fortran_order, raw)
    }

    fn unsupported(&self, name: &'static str) -> PickleError {
        PickleError::UnsupportedOpcode {
            name,
            offset: self.offset,
        }
    }
}

fn numpy_call(call: NumpyCall, args: Vec<Value>) -> Result<Item> {
    let arg = |index: usize| {
        args.get(index).ok_or_else(|| PickleError::UnexpectedValue {
            op: "REDUCE",
            expected: "more numpy arguments",
            found: format!("{} arguments", args.len()),
        })
    };

    let value = match call {
        NumpyCall::Reconstruct => {
            let class = match args.first() {
                Some(Value::Global(class)) => class.clone(),
                _ => Global::new("numpy", "ndarray"),
            };
            let mut instance = Instance::new(class, args);
            instance.pending_array = true;
            return Ok(Item::Object(Box::new(instance)));
        }
        NumpyCall::Scalar => {
            let dtype = DType::from_value(arg(0)?)?;
            let payload = arg(1)?;
            let scalar = if dtype.kind == 'O' {
                NdArray::from_objects(dtype, Vec::new(), false, vec![payload.clone()])?
            } else {
                let raw = numpy::payload_bytes(payload)
                    .ok_or_else(|| unexpected_value("scalar", "a bytes payload", payload))?;
                NdArray::from_bytes(dtype, Vec::new(), false, &raw)?
            };
            Value::Scalar(scalar)
        }
        NumpyCall::FromBuffer => {
            let buffer = arg(0)?;
            let raw = numpy::payload_bytes(buffer)
                .ok_or_else(|| unexpected_value("_frombuffer", "a buffer", buffer))?;
            let dtype = DType::from_value(arg(1)?)?;
            let shape = numpy::shape_from_value(arg(2)?)?;
            let fortran_order = args.get(3).and_then(Value::as_str) == Some("F");
            Value::Array(NdArray::from_bytes(dtype, shape, fortran_order, &raw)?)
        }
    };
    Ok(Item::Value(value))
}

/// Apply numpy's `ndarray.__setstate__` tuple:
/// `([version,] shape, dtype, is_fortran, rawdata)`
fn array_from_state(state: &Value) -> Result<NdArray> {
    let parts = match state {
        Value::Tuple(parts) if parts.len() == 5 => &parts[1..],
        Value::Tuple(parts) if parts.len() == 4 => &parts[..],
        other => return Err(unexpected_value("BUILD", "an ndarray state tuple", other)),
    };
    let shape = numpy::shape_from_value(&parts[0])?;
    let dtype = DType::from_value(&parts[1])?;
    let fortran_order = parts[2].as_int().unwrap_or(0) != 0;
    match &parts[3] {
        Value::List(items) if dtype.kind == 'O' => {
            NdArray::from_objects(dtype, shape, fortran_order, items.clone())
        }
        payload => {
            let raw = numpy::payload_bytes(payload)
                .ok_or_else(|| unexpected_value("BUILD", "raw array bytes", payload))?;
            NdArray::from_bytes(dtype, shape, fortran_order, &raw)
        }
    }
}

fn invalid(kind: &'static str, text: &str) -> PickleError {
    PickleError::InvalidLiteral {
        kind,
        text: text.to_string(),
    }
}

fn unexpected(op: &'static str, expected: &'static str, found: &Item) -> PickleError {
    PickleError::UnexpectedValue {
        op,
        expected,
        found: found.describe(),
    }
}

fn unexpected_value(op: &'static str, expected: &'static str, found: &Value) -> PickleError {
    PickleError::UnexpectedValue {
        op,
        expected,
        found: found.class_name(),
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn encode(text: &str, encoding: &str) -> Result<Vec<u8>> {
    match encoding.to_ascii_lowercase().as_str() {
        "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).map_err(|_| invalid("latin-1 text", text)))
            .collect(),
        "utf-8" | "utf8" => Ok(text.as_bytes().to_vec()),
        _ => Err(invalid("encoding", encoding)),
    }
}

/// Little-endian two's complement integer of `LONG1`/`LONG4`
fn decode_long(bytes: &[u8]) -> Value {
    match bytes.len() {
        0 => Value::Int(0),
        len @ 1..=8 => {
            let fill = if bytes[len - 1] & 0x80 != 0 { 0xff } else { 0 };
            let mut buf = [fill; 8];
            buf[..len].copy_from_slice(bytes);
            Value::Int(i64::from_le_bytes(buf))
        }
        _ => Value::BigInt(bytes.to_vec()),
    }
}

/// Decimal literal of the text protocol, widened to a big integer when it
/// does not fit 64 bits
fn parse_decimal(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::Int(n));
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut bytes: Vec<u8> = vec![0];
    for digit in digits.bytes() {
        let mut carry = u32::from(digit - b'0');
        for byte in bytes.iter_mut() {
            let v = u32::from(*byte) * 10 + carry;
            *byte = v as u8;
            carry = v >> 8;
        }
        while carry > 0 {
            bytes.push(carry as u8);
            carry >>= 8;
        }
    }
    // room for the sign bit
    bytes.push(0);
    if negative {
        let mut carry = true;
        for byte in bytes.iter_mut() {
            let (v, overflow) = (!*byte).overflowing_add(u8::from(carry));
            *byte = v;
            carry = overflow;
        }
    }
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let sign_bit = bytes[bytes.len() - 2] & 0x80 != 0;
        if (last == 0 && !sign_bit) || (last == 0xff && sign_bit) {
            bytes.pop();
        } else {
            break;
        }
    }
    Some(Value::BigInt(bytes))
}

/// Argument of the text `STRING` opcode: a quoted literal with backslash
/// escapes
fn unquote(line: &[u8]) -> Option<Vec<u8>> {
    let quote = *line.first()?;
    if line.len() < 2 || !matches!(quote, b'\'' | b'"') || line[line.len() - 1] != quote {
        return None;
    }
    let body = &line[1..line.len() - 1];

    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] != b'\\' || i + 1 == body.len() {
            out.push(body[i]);
            i += 1;
            continue;
        }
        let escape = body[i + 1];
        i += 2;
        match escape {
            b'\n' => {}
            b'\\' | b'\'' | b'"' => out.push(escape),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'x' => {
                let hex = body.get(i..i + 2)?;
                out.push(u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?);
                i += 2;
            }
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                let mut taken = 0;
                while taken < 2 && i < body.len() && (b'0'..=b'7').contains(&body[i]) {
                    value = value * 8 + u32::from(body[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push(value as u8);
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Python's raw-unicode-escape codec: `\uXXXX` and `\UXXXXXXXX` escapes,
/// every other byte is latin-1
fn raw_unicode_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let width = match bytes.get(i..i + 2) {
            Some(b"\\u") => 4,
            Some(b"\\U") => 8,
            _ => 0,
        };
        let escaped = (width > 0)
            .then(|| bytes.get(i + 2..i + 2 + width))
            .flatten()
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u32::from_str_radix(hex, 16).ok());
        match escaped {
            Some(code) => {
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                i += 2 + width;
            }
            None => {
                out.push(char::from(bytes[i]));
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickle::loads;

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    /// `{'a': [1, 2.5, None, True], 'b': (b'xy', 'é')}`
    fn sample() -> Value {
        Value::Dict(vec![
            (
                s("a"),
                Value::List(vec![
                    Value::Int(1),
                    Value::Float(2.5),
                    Value::None,
                    Value::Bool(true),
                ]),
            ),
            (
                s("b"),
                Value::Tuple(vec![Value::Bytes(b"xy".to_vec()), s("é")]),
            ),
        ])
    }

    #[test]
    fn test_text_protocol() {
        let stream = b"(dp0\nVa\np1\n(lp2\nI1\naF2.5\naNaI01\nasVb\np3\n(c_codecs\nencode\np4\n(Vxy\np5\nVlatin1\np6\ntp7\nRp8\nV\xe9\np9\ntp10\ns.";
        assert_eq!(loads(stream).unwrap(), sample());
    }

    #[test]
    fn test_protocol_2() {
        let stream = b"\x80\x02\x7d\x71\x00\x28\x58\x01\x00\x00\x00\x61\x71\x01\x5d\x71\x02\x28\x4b\x01\x47\x40\x04\x00\x00\x00\x00\x00\x00\x4e\x88\x65\x58\x01\x00\x00\x00\x62\x71\x03\x63\x5f\x63\x6f\x64\x65\x63\x73\x0a\x65\x6e\x63\x6f\x64\x65\x0a\x71\x04\x58\x02\x00\x00\x00\x78\x79\x71\x05\x58\x06\x00\x00\x00\x6c\x61\x74\x69\x6e\x31\x71\x06\x86\x71\x07\x52\x71\x08\x58\x02\x00\x00\x00\xc3\xa9\x71\x09\x86\x71\x0a\x75\x2e";
        let mut unpickler = Unpickler::new(stream);
        assert_eq!(unpickler.load().unwrap(), sample());
        assert_eq!(unpickler.protocol(), 2);
    }

    #[test]
    fn test_protocol_4_with_frames() {
        let stream = b"\x80\x04\x95\x2a\x00\x00\x00\x00\x00\x00\x00\x7d\x94\x28\x8c\x01\x61\x94\x5d\x94\x28\x4b\x01\x47\x40\x04\x00\x00\x00\x00\x00\x00\x4e\x88\x65\x8c\x01\x62\x94\x43\x02\x78\x79\x94\x8c\x02\xc3\xa9\x94\x86\x94\x75\x2e";
        assert_eq!(loads(stream).unwrap(), sample());
    }

    #[test]
    fn test_shared_reference_sees_later_appends() {
        // l = [1]; [l, l]
        let stream = b"\x80\x04\x95\x0c\x00\x00\x00\x00\x00\x00\x00\x5d\x94\x28\x5d\x94\x4b\x01\x61\x68\x01\x65\x2e";
        let inner = Value::List(vec![Value::Int(1)]);
        assert_eq!(loads(stream).unwrap(), Value::List(vec![inner.clone(), inner]));
    }

    #[test]
    fn test_integers() {
        // [2**70, -5, 300, 70000, -2**40]
        let stream = b"\x80\x02\x5d\x71\x00\x28\x8a\x09\x00\x00\x00\x00\x00\x00\x00\x00\x40\x4a\xfb\xff\xff\xff\x4d\x2c\x01\x4a\x70\x11\x01\x00\x8a\x06\x00\x00\x00\x00\x00\xff\x65\x2e";
        assert_eq!(
            loads(stream).unwrap(),
            Value::List(vec![
                Value::BigInt(vec![0, 0, 0, 0, 0, 0, 0, 0, 0x40]),
                Value::Int(-5),
                Value::Int(300),
                Value::Int(70000),
                Value::Int(-(1 << 40)),
            ])
        );
    }

    #[test]
    fn test_sets() {
        // ({1, 2}, frozenset({3}))
        let stream = b"\x80\x04\x95\x10\x00\x00\x00\x00\x00\x00\x00\x8f\x94\x28\x4b\x01\x4b\x02\x90\x28\x4b\x03\x91\x94\x86\x94\x2e";
        assert_eq!(
            loads(stream).unwrap(),
            Value::Tuple(vec![
                Value::Set(vec![Value::Int(1), Value::Int(2)]),
                Value::FrozenSet(vec![Value::Int(3)]),
            ])
        );
    }

    #[test]
    fn test_bytearray_protocol_5() {
        let stream = b"\x80\x05\x95\x0d\x00\x00\x00\x00\x00\x00\x00\x96\x02\x00\x00\x00\x00\x00\x00\x00\x61\x62\x94\x2e";
        assert_eq!(loads(stream).unwrap(), Value::ByteArray(b"ab".to_vec()));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        // l = []; l.append(l)
        let stream = b"\x80\x04\x95\x06\x00\x00\x00\x00\x00\x00\x00\x5d\x94\x68\x00\x61\x2e";
        assert!(matches!(loads(stream), Err(PickleError::Recursive(0))));
    }

    #[test]
    fn test_malformed_streams() {
        assert!(matches!(loads(b""), Err(PickleError::Empty)));
        assert!(matches!(loads(b"\x80\x04\x95\x2a\x00\x00\x00\x00\x00\x00\x00\x7d\x94\x28\x8c\x01\x61\x94\x5d\x94"), Err(PickleError::Truncated)));
        assert!(matches!(
            loads(b"\x80\x04\xff"),
            Err(PickleError::UnknownOpcode { opcode: 0xff, offset: 2 })
        ));
        assert!(matches!(loads(b"\x80\x06N."), Err(PickleError::UnsupportedProtocol(6))));
        assert!(matches!(loads(b"a."), Err(PickleError::StackUnderflow(0))));
        assert!(matches!(loads(b"e."), Err(PickleError::MissingMark(0))));
        assert!(matches!(loads(b"h\x05."), Err(PickleError::MissingMemo(5))));
        assert!(matches!(
            loads(b"\x97."),
            Err(PickleError::UnsupportedOpcode { name: "NEXT_BUFFER", .. })
        ));
    }

    #[test]
    fn test_oversized_array_shape_is_rejected() {
        // _reconstruct(ndarray, (0,), b'b') with state ((2**62, 8), 'f8', False, b'')
        let stream = b"\x80\x02cnumpy.core.multiarray\n_reconstruct\n(cnumpy\nndarray\nK\x00\x85C\x01btR(\x8a\x08\x00\x00\x00\x00\x00\x00\x00\x40K\x08\x86Vf8\n\x89C\x00tb.";
        assert!(matches!(loads(stream), Err(PickleError::ArrayTooBig)));
    }

    #[test]
    fn test_reduce_records_callable_without_running_it() {
        // os.system('echo') must come back as a plain record
        let stream = b"cos\nsystem\n(Vecho\ntR.";
        match loads(stream).unwrap() {
            Value::Object(object) => {
                assert!(object.class.is("os", "system"));
                assert_eq!(object.args, vec![s("echo")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_text_literals() {
        assert_eq!(unquote(b"'a\\'b\\x41\\n'"), Some(b"a'bA\n".to_vec()));
        assert_eq!(unquote(b"abc"), None);
        assert_eq!(raw_unicode_escape(b"caf\\u00e9 \xe9"), "café é");
        assert_eq!(loads(b"L12345678901234567890123L\n.").unwrap(), parse_decimal("12345678901234567890123").unwrap());
        assert_eq!(parse_decimal("-129"), Some(Value::Int(-129)));
        assert_eq!(
            parse_decimal("-18446744073709551616"),
            Some(Value::BigInt(vec![0, 0, 0, 0, 0, 0, 0, 0, 0xff]))
        );
        assert_eq!(
            parse_decimal("18446744073709551615"),
            Some(Value::BigInt(vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0]))
        );
    }

    #[test]
    fn test_joblib_inline_arrays() {
        let stream = include_bytes!("../../tests/fixtures/standard_scaler.pkl");
        let mut unpickler = Unpickler::new(stream);
        let value = unpickler.load().unwrap();
        assert_eq!(unpickler.inline_arrays(), 3);
        assert_eq!(unpickler.position(), stream.len());

        let Value::Object(scaler) = value else {
            panic!("expected an object");
        };
        assert!(scaler.class.is("sklearn.preprocessing._data", "StandardScaler"));
        match scaler.attr("mean_") {
            Some(Value::Array(mean)) => {
                assert_eq!(mean.shape, vec![2]);
                assert_eq!(mean.elements(), vec![Value::Float(0.1), Value::Float(0.2)]);
            }
            other => panic!("unexpected mean_ {other:?}"),
        }
        assert_eq!(scaler.attr("_sklearn_version"), Some(&s("1.3.2")));
    }

    #[test]
    fn test_reconstructed_arrays() {
        let stream = include_bytes!("../../tests/fixtures/scaler_protocol2.pkl");
        let Value::Object(scaler) = loads(stream).unwrap() else {
            panic!("expected an object");
        };
        match scaler.attr("scale_") {
            Some(Value::Array(scale)) => assert_eq!(
                scale.elements(),
                vec![Value::Float(2.0), Value::Float(0.5), Value::Float(1e16)]
            ),
            other => panic!("unexpected scale_ {other:?}"),
        }
    }
}
