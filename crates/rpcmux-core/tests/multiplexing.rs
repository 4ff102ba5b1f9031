//! End-to-end multiplexing over in-memory transports.

use rpcmux_core::{
    ApplicationErrorKind, ApplicationException, BinaryProtocol, FieldType, MemoryBuffer,
    MessageHeader, MessageType, MultiplexedProcessor, MultiplexedProtocol, MuxError, Processor,
    Protocol, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Handler-side processor for a two-argument `add` / `subtract` service.
struct Calculator {
    seen: Mutex<Vec<MessageHeader>>,
}

impl Calculator {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }

    fn read_args(input: &mut dyn Protocol) -> Result<(i32, i32)> {
        let mut a = 0;
        let mut b = 0;
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.field_type) {
                (_, FieldType::Stop) => break,
                (1, FieldType::I32) => a = input.read_i32()?,
                (2, FieldType::I32) => b = input.read_i32()?,
                (_, other) => input.skip(other)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        input.read_message_end()?;
        Ok((a, b))
    }
}

impl Processor for Calculator {
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool> {
        let header = input.read_message_begin()?;
        self.seen.lock().unwrap().push(header.clone());

        let (a, b) = Self::read_args(input)?;
        let result = match header.name.as_str() {
            "add" => a + b,
            "subtract" => a - b,
            other => {
                ApplicationException::new(
                    ApplicationErrorKind::UnknownMethod,
                    format!("Unknown function {}", other),
                )
                .write_reply(output, &header.name, header.seq_id)?;
                return Ok(true);
            }
        };

        output.write_message_begin(&header.name, MessageType::Reply, header.seq_id)?;
        output.write_struct_begin("result")?;
        output.write_field_begin("success", FieldType::I32, 0)?;
        output.write_i32(result)?;
        output.write_field_end()?;
        output.write_field_stop()?;
        output.write_struct_end()?;
        output.write_message_end()?;
        output.flush()?;
        Ok(true)
    }
}

fn write_call(protocol: &mut dyn Protocol, name: &str, seq_id: i32, a: i32, b: i32) {
    protocol
        .write_message_begin(name, MessageType::Call, seq_id)
        .unwrap();
    protocol.write_struct_begin("args").unwrap();
    protocol.write_field_begin("a", FieldType::I32, 1).unwrap();
    protocol.write_i32(a).unwrap();
    protocol.write_field_end().unwrap();
    protocol.write_field_begin("b", FieldType::I32, 2).unwrap();
    protocol.write_i32(b).unwrap();
    protocol.write_field_end().unwrap();
    protocol.write_field_stop().unwrap();
    protocol.write_struct_end().unwrap();
    protocol.write_message_end().unwrap();
}

fn read_i32_result(protocol: &mut dyn Protocol) -> i32 {
    protocol.read_struct_begin().unwrap();
    let field = protocol.read_field_begin().unwrap();
    assert_eq!(field.id, 0);
    assert_eq!(field.field_type, FieldType::I32);
    let value = protocol.read_i32().unwrap();
    protocol.read_field_end().unwrap();
    assert_eq!(
        protocol.read_field_begin().unwrap().field_type,
        FieldType::Stop
    );
    protocol.read_struct_end().unwrap();
    protocol.read_message_end().unwrap();
    value
}

/// Counts invocations and consumes nothing beyond the header.
fn dummy_processor(calls: Arc<AtomicUsize>) -> impl Processor {
    move |input: &mut dyn Protocol, _output: &mut dyn Protocol| -> Result<bool> {
        input.read_message_begin()?;
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[test]
fn test_calculator_add_round_trip() {
    let calculator = Arc::new(Calculator::new());
    let server = MultiplexedProcessor::new();
    server
        .register_shared("Calculator", calculator.clone())
        .unwrap();

    let mut client = MultiplexedProtocol::new(BinaryProtocol::new(MemoryBuffer::new()), "Calculator");
    write_call(&mut client, "add", 1, 2, 2);

    let mut input = client.into_inner();
    let mut output = BinaryProtocol::new(MemoryBuffer::new());
    assert!(server.process(&mut input, &mut output).unwrap());

    let seen = calculator.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![MessageHeader::new("add", MessageType::Call, 1)]);

    // The reply goes out under the bare function name.
    let header = output.read_message_begin().unwrap();
    assert_eq!(header, MessageHeader::new("add", MessageType::Reply, 1));
    assert_eq!(read_i32_result(&mut output), 4);
}

#[test]
fn test_two_services_share_one_stream() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = MultiplexedProcessor::new();
    server
        .register_processor("Calculator", Calculator::new())
        .unwrap();
    server
        .register_processor("WeatherReport", dummy_processor(calls.clone()))
        .unwrap();
    assert!(server.is_registered("Calculator"));
    assert!(server.is_registered("WeatherReport"));
    assert_eq!(server.len(), 2);

    let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
    write_call(
        &mut MultiplexedProtocol::new(&mut protocol, "Calculator"),
        "subtract",
        7,
        10,
        3,
    );
    MultiplexedProtocol::new(&mut protocol, "WeatherReport")
        .write_message_begin("get_temperature", MessageType::Oneway, 8)
        .unwrap();

    let mut output = BinaryProtocol::new(MemoryBuffer::new());
    assert!(server.process(&mut protocol, &mut output).unwrap());
    assert!(server.process(&mut protocol, &mut output).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let header = output.read_message_begin().unwrap();
    assert_eq!(header.seq_id, 7);
    assert_eq!(read_i32_result(&mut output), 7);
}

#[test]
fn test_unknown_function_gets_exception_reply() {
    let server = MultiplexedProcessor::new();
    server
        .register_processor("Calculator", Calculator::new())
        .unwrap();

    let mut client = MultiplexedProtocol::new(BinaryProtocol::new(MemoryBuffer::new()), "Calculator");
    write_call(&mut client, "divide", 5, 1, 0);

    let mut input = client.into_inner();
    let mut output = BinaryProtocol::new(MemoryBuffer::new());
    assert!(server.process(&mut input, &mut output).unwrap());

    let header = output.read_message_begin().unwrap();
    assert_eq!(header, MessageHeader::new("divide", MessageType::Exception, 5));
    let exception = ApplicationException::read(&mut output).unwrap();
    assert_eq!(exception.kind, ApplicationErrorKind::UnknownMethod);
    assert_eq!(exception.message, "Unknown function divide");
}

#[test]
fn test_untagged_call_never_reaches_a_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = MultiplexedProcessor::new();
    server
        .register_processor("Calculator", dummy_processor(calls.clone()))
        .unwrap();

    // A plain (non-multiplexed) client.
    let mut input = BinaryProtocol::new(MemoryBuffer::new());
    write_call(&mut input, "add", 1, 1, 1);
    let mut output = BinaryProtocol::new(MemoryBuffer::new());

    let err = server.process(&mut input, &mut output).unwrap_err();
    assert!(matches!(err, MuxError::MalformedHeader { ref name } if name == "add"));
    assert!(err.to_string().contains("MultiplexedProtocol"));
    assert!(err.is_request_rejection());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(output.into_inner().is_empty());
}

#[test]
fn test_unregistered_service_is_reported() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = MultiplexedProcessor::new();
    server
        .register_processor("Calculator", dummy_processor(calls.clone()))
        .unwrap();

    let mut client = MultiplexedProtocol::new(BinaryProtocol::new(MemoryBuffer::new()), "Weather");
    write_call(&mut client, "forecast", 1, 0, 0);
    let mut input = client.into_inner();
    let mut output = BinaryProtocol::new(MemoryBuffer::new());

    let err = server.process(&mut input, &mut output).unwrap_err();
    assert!(matches!(err, MuxError::UnknownService { ref name } if name == "Weather"));
    assert!(err.to_string().contains("register_processor"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reply_sent_to_server_is_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = MultiplexedProcessor::new();
    server
        .register_processor("Calculator", dummy_processor(calls.clone()))
        .unwrap();

    let mut input = BinaryProtocol::new(MemoryBuffer::new());
    input
        .write_message_begin("Calculator:add", MessageType::Reply, 1)
        .unwrap();
    let mut output = BinaryProtocol::new(MemoryBuffer::new());

    let err = server.process(&mut input, &mut output).unwrap_err();
    assert!(matches!(
        err,
        MuxError::UnexpectedMessageType {
            got: MessageType::Reply
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_handler_reading_header_twice_fails() {
    let server = MultiplexedProcessor::new();
    server
        .register_processor(
            "Calculator",
            |input: &mut dyn Protocol, _output: &mut dyn Protocol| -> Result<bool> {
                input.read_message_begin()?;
                input.read_message_begin()?;
                Ok(true)
            },
        )
        .unwrap();

    let mut input = BinaryProtocol::new(MemoryBuffer::new());
    MultiplexedProtocol::new(&mut input, "Calculator")
        .write_message_begin("add", MessageType::Call, 1)
        .unwrap();
    let mut output = BinaryProtocol::new(MemoryBuffer::new());

    let err = server.process(&mut input, &mut output).unwrap_err();
    assert!(matches!(err, MuxError::HeaderConsumed));
}

#[test]
fn test_function_name_keeps_later_separators() {
    let server = MultiplexedProcessor::new();
    let seen = Arc::new(Mutex::new(None));
    let seen_in_handler = seen.clone();
    server
        .register_processor(
            "Calculator",
            move |input: &mut dyn Protocol, _output: &mut dyn Protocol| -> Result<bool> {
                *seen_in_handler.lock().unwrap() = Some(input.read_message_begin()?.name);
                Ok(true)
            },
        )
        .unwrap();

    let mut input = BinaryProtocol::new(MemoryBuffer::new());
    input
        .write_message_begin("Calculator:ns:add", MessageType::Call, 1)
        .unwrap();
    let mut output = BinaryProtocol::new(MemoryBuffer::new());
    server.process(&mut input, &mut output).unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("ns:add"));
}
