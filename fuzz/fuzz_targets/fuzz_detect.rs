//! Fuzz the built-in automaton with arbitrary streams fed in uneven chunks

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use sigstream::domain::entities::Metadata;
use sigstream::domain::services::{CompilerOptions, ProcessorFactory, SignatureCatalog};
use std::sync::OnceLock;

fn factory() -> &'static ProcessorFactory {
    static FACTORY: OnceLock<ProcessorFactory> = OnceLock::new();
    FACTORY.get_or_init(|| {
        SignatureCatalog::builtin()
            .unwrap()
            .compile(&CompilerOptions::default())
            .unwrap()
    })
}

fuzz_target!(|data: &[u8]| {
    let Some((&step, stream)) = data.split_first() else {
        return;
    };
    let step = usize::from(step % 16) + 1;

    let mut whole = factory().create_processor();
    let mut window = stream;
    let expected = whole.detect(&mut window, &mut Metadata::new(), true).id().to_string();
    assert!(whole.is_finished());

    let mut chunked = factory().create_processor();
    let mut buffer = BytesMut::new();
    let mut metadata = Metadata::new();
    for (i, chunk) in stream.chunks(step).enumerate() {
        buffer.extend_from_slice(chunk);
        let end_of_stream = (i + 1) * step >= stream.len();
        if buffer.len() < factory().lookahead_count() && !end_of_stream {
            continue;
        }
        chunked.detect(&mut buffer, &mut metadata, end_of_stream);
        if chunked.is_finished() {
            break;
        }
    }
    if !chunked.is_finished() {
        chunked.detect(&mut buffer, &mut metadata, true);
    }

    assert_eq!(chunked.content_signature().id(), expected);
});
