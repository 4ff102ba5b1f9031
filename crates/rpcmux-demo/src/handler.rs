//! Handler-processors for the demo services.
//!
//! Both services use the usual struct framing: arguments arrive as a struct
//! with one field per parameter (ids from 1), and results go back as a struct
//! whose field 0 holds the return value.
//!
//! ```text
//! service Calculator    { i32 add(1: i32 a, 2: i32 b), i32 subtract(1: i32 a, 2: i32 b) }
//! service WeatherReport { double get_temperature() }
//! ```

use rpcmux_core::{
    ApplicationErrorKind, ApplicationException, FieldType, MessageHeader, MessageType, Processor,
    Protocol, Result,
};
use tracing::{debug, warn};

pub const CALCULATOR: &str = "Calculator";
pub const WEATHER_REPORT: &str = "WeatherReport";

/// Return value of a demo call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    Double(f64),
}

impl Value {
    fn field_type(self) -> FieldType {
        match self {
            Value::I32(_) => FieldType::I32,
            Value::Double(_) => FieldType::Double,
        }
    }

    fn write(self, protocol: &mut dyn Protocol) -> Result<()> {
        match self {
            Value::I32(v) => protocol.write_i32(v),
            Value::Double(v) => protocol.write_double(v),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
        }
    }
}

/// Read an argument struct of i32 fields into `args`, indexed by field id.
///
/// Unknown fields are skipped; missing ones keep their value.
fn read_i32_args(input: &mut dyn Protocol, args: &mut [i32]) -> Result<()> {
    input.read_struct_begin()?;
    loop {
        let field = input.read_field_begin()?;
        if field.field_type == FieldType::Stop {
            break;
        }
        let slot = usize::try_from(field.id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .filter(|&index| index < args.len());
        match (slot, field.field_type) {
            (Some(index), FieldType::I32) => args[index] = input.read_i32()?,
            (_, other) => input.skip(other)?,
        }
        input.read_field_end()?;
    }
    input.read_struct_end()?;
    input.read_message_end()
}

/// Skip an argument struct we have no use for.
fn skip_args(input: &mut dyn Protocol) -> Result<()> {
    input.skip(FieldType::Struct)?;
    input.read_message_end()
}

/// Answer with a REPLY unless the call was one-way.
fn write_success(output: &mut dyn Protocol, header: &MessageHeader, value: Value) -> Result<()> {
    if header.message_type == MessageType::Oneway {
        debug!("{} is one-way, dropping result {}", header.name, value);
        return Ok(());
    }
    output.write_message_begin(&header.name, MessageType::Reply, header.seq_id)?;
    output.write_struct_begin(&format!("{}_result", header.name))?;
    output.write_field_begin("success", value.field_type(), 0)?;
    value.write(output)?;
    output.write_field_end()?;
    output.write_field_stop()?;
    output.write_struct_end()?;
    output.write_message_end()?;
    output.flush()
}

/// Answer with an EXCEPTION reply unless the call was one-way.
fn write_exception(
    output: &mut dyn Protocol,
    header: &MessageHeader,
    exception: ApplicationException,
) -> Result<()> {
    warn!("{} failed: {}", header.name, exception.message);
    if header.message_type == MessageType::Oneway {
        return Ok(());
    }
    exception.write_reply(output, &header.name, header.seq_id)
}

fn unknown_function(header: &MessageHeader) -> ApplicationException {
    ApplicationException::new(
        ApplicationErrorKind::UnknownMethod,
        format!("Unknown function {}", header.name),
    )
}

/// `Calculator` service.
#[derive(Debug, Default)]
pub struct CalculatorProcessor;

impl Processor for CalculatorProcessor {
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool> {
        let header = input.read_message_begin()?;
        debug!("Calculator.{} (seq {})", header.name, header.seq_id);

        let op: fn(i32, i32) -> Option<i32> = match header.name.as_str() {
            "add" => i32::checked_add,
            "subtract" => i32::checked_sub,
            _ => {
                skip_args(input)?;
                write_exception(output, &header, unknown_function(&header))?;
                return Ok(true);
            }
        };

        let mut args = [0i32; 2];
        read_i32_args(input, &mut args)?;
        match op(args[0], args[1]) {
            Some(result) => write_success(output, &header, Value::I32(result))?,
            None => write_exception(
                output,
                &header,
                ApplicationException::new(
                    ApplicationErrorKind::InternalError,
                    format!("{}({}, {}) overflows i32", header.name, args[0], args[1]),
                ),
            )?,
        }
        Ok(true)
    }
}

/// `WeatherReport` service reporting a fixed temperature.
#[derive(Debug)]
pub struct WeatherReportProcessor {
    temperature: f64,
}

impl WeatherReportProcessor {
    pub fn new(temperature: f64) -> Self {
        Self { temperature }
    }
}

impl Processor for WeatherReportProcessor {
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool> {
        let header = input.read_message_begin()?;
        debug!("WeatherReport.{} (seq {})", header.name, header.seq_id);
        skip_args(input)?;

        if header.name == "get_temperature" {
            write_success(output, &header, Value::Double(self.temperature))?;
        } else {
            write_exception(output, &header, unknown_function(&header))?;
        }
        Ok(true)
    }
}

/// Write a call to `function` with i32 arguments numbered from 1.
pub fn write_call(
    output: &mut dyn Protocol,
    function: &str,
    seq_id: i32,
    args: &[i32],
) -> Result<()> {
    output.write_message_begin(function, MessageType::Call, seq_id)?;
    output.write_struct_begin(&format!("{}_args", function))?;
    for (id, value) in (1i16..).zip(args) {
        output.write_field_begin("arg", FieldType::I32, id)?;
        output.write_i32(*value)?;
        output.write_field_end()?;
    }
    output.write_field_stop()?;
    output.write_struct_end()?;
    output.write_message_end()?;
    output.flush()
}

/// Read the reply to call `function`/`seq_id`, turning an EXCEPTION into an error.
pub fn read_reply(input: &mut dyn Protocol, function: &str, seq_id: i32) -> Result<Value> {
    let header = input.read_message_begin()?;
    if header.name != function {
        return Err(ApplicationException::new(
            ApplicationErrorKind::WrongMethodName,
            format!("expected a reply to {}, got {}", function, header.name),
        )
        .into());
    }
    if header.seq_id != seq_id {
        return Err(ApplicationException::new(
            ApplicationErrorKind::BadSequenceId,
            format!("expected sequence id {}, got {}", seq_id, header.seq_id),
        )
        .into());
    }
    if header.message_type == MessageType::Exception {
        let exception = ApplicationException::read(input)?;
        input.read_message_end()?;
        return Err(exception.into());
    }
    if header.message_type != MessageType::Reply {
        return Err(ApplicationException::new(
            ApplicationErrorKind::InvalidMessageType,
            format!("expected a reply, got {}", header.message_type),
        )
        .into());
    }

    let mut value = None;
    input.read_struct_begin()?;
    loop {
        let field = input.read_field_begin()?;
        match (field.id, field.field_type) {
            (_, FieldType::Stop) => break,
            (0, FieldType::I32) => value = Some(Value::I32(input.read_i32()?)),
            (0, FieldType::Double) => value = Some(Value::Double(input.read_double()?)),
            (_, other) => input.skip(other)?,
        }
        input.read_field_end()?;
    }
    input.read_struct_end()?;
    input.read_message_end()?;

    value.ok_or_else(|| {
        ApplicationException::new(
            ApplicationErrorKind::MissingResult,
            format!("{} returned no result", header.name),
        )
        .into()
    })
}
