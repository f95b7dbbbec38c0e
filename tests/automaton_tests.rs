//! Automaton compiler and matcher tests
//!
//! Each test compiles a small set of signatures and classifies streams
//! against the resulting decision graph.

use bytes::BytesMut;
use rstest::*;
use sigstream::domain::entities::{ContentSignature, Length, Metadata, Segment};
use sigstream::domain::services::{
    AutomatonCompiler, CompilerOptions, DecisionGraph, ProcessorFactory, ProcessorStatus, Step,
};
use std::sync::Arc;

fn compile(signatures: Vec<ContentSignature>) -> ProcessorFactory {
    let signatures: Vec<Arc<ContentSignature>> = signatures.into_iter().map(Arc::new).collect();
    ProcessorFactory::from_signatures(&signatures, &CompilerOptions::default()).unwrap()
}

/// Classifies a complete stream in one call
fn classify(factory: &ProcessorFactory, data: &[u8]) -> (String, ProcessorStatus, Metadata) {
    let mut processor = factory.create_processor();
    let mut metadata = Metadata::new();
    let mut window = data;
    let id = processor.detect(&mut window, &mut metadata, true).id().to_string();
    (id, processor.status(), metadata)
}

fn sig(id: &str, format: Vec<Segment>) -> ContentSignature {
    ContentSignature::new(id, format!("application/x-{}", id), format)
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[rstest]
fn test_constant_then_fixed_span() {
    let factory = compile(vec![sig("s1", vec![Segment::constant("GIF8"), Segment::any(2)])]);

    let (id, status, _) = classify(&factory, b"GIF89a");
    assert_eq!(id, "s1");
    assert_eq!(status, ProcessorStatus::Complete);
}

#[fixture]
fn keyed_records() -> ProcessorFactory {
    compile(vec![sig(
        "s2",
        vec![
            Segment::repeat(vec![Segment::key("K="), Segment::constant(";")], 1, Some(99)),
            Segment::constant(vec![0x00]),
        ],
    )])
}

#[rstest]
fn test_repeated_key_keeps_last_value(keyed_records: ProcessorFactory) {
    let (id, status, metadata) = classify(&keyed_records, b"K=A;K=B;\x00");

    assert_eq!(id, "s2");
    assert_eq!(status, ProcessorStatus::Complete);
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata.get("K=").map(String::as_str), Some("B"));
}

#[rstest]
fn test_shared_prefix_node_visited_once() {
    let factory = compile(vec![
        sig("local", vec![Segment::constant_hex("504B0304").unwrap()]),
        sig("end", vec![Segment::constant_hex("504B0506").unwrap()]),
    ]);
    let shared = factory
        .graph()
        .follow_constant(DecisionGraph::ROOT, b"PK")
        .expect("PK prefix is a node of its own");

    for (stream, expected) in [(&b"PK\x03\x04"[..], "local"), (&b"PK\x05\x06"[..], "end")] {
        let mut processor = factory.create_processor().with_trace();
        let mut window = stream;
        let signature = processor.detect(&mut window, &mut Metadata::new(), true);
        assert_eq!(signature.id(), expected);

        let visits = processor
            .trail()
            .unwrap()
            .iter()
            .filter(|&&node| node == shared)
            .count();
        assert_eq!(visits, 1);
    }
}

#[rstest]
fn test_insufficient_data_stalls() {
    let factory = compile(vec![sig("s1", vec![Segment::constant("GIF8"), Segment::any(2)])]);
    let mut processor = factory.create_processor();
    let mut metadata = Metadata::new();
    let mut buffer = BytesMut::from(&b"GI"[..]);

    let before = processor.current_node();
    let signature = processor.detect(&mut buffer, &mut metadata, false);
    assert!(signature.is_generic());
    assert_eq!(processor.status(), ProcessorStatus::Detecting);
    assert_eq!(processor.current_node(), before);
    assert_eq!(&buffer[..], b"GI");

    buffer.extend_from_slice(b"F89a");
    let signature = processor.detect(&mut buffer, &mut metadata, false);
    assert_eq!(signature.id(), "s1");
    assert_eq!(processor.status(), ProcessorStatus::Complete);
    assert!(buffer.is_empty());
}

// ============================================================================
// Edge kinds
// ============================================================================

#[rstest]
#[case(&b"A\x10"[..], true)]
#[case(&b"A\x15"[..], true)]
#[case(&b"A\x20"[..], true)]
#[case(&b"A\x0F"[..], false)]
#[case(&b"A\x21"[..], false)]
fn test_single_byte_range(#[case] stream: &[u8], #[case] matches: bool) {
    let factory = compile(vec![sig(
        "r",
        vec![Segment::constant("A"), Segment::range(vec![0x10], vec![0x20])],
    )]);
    let (id, _, _) = classify(&factory, stream);
    assert_eq!(id == "r", matches);
}

#[rstest]
#[case(&b"\x01\x00"[..], true)]
#[case(&b"\x01\x80"[..], true)]
#[case(&b"\x02\xFF"[..], true)]
#[case(&b"\x00\xFF"[..], false)]
#[case(&b"\x03\x00"[..], false)]
fn test_multi_byte_range_is_big_endian(#[case] stream: &[u8], #[case] matches: bool) {
    let factory = compile(vec![sig(
        "r",
        vec![Segment::range_hex("0100", "02FF").unwrap()],
    )]);
    let (id, _, _) = classify(&factory, stream);
    assert_eq!(id == "r", matches);
}

#[rstest]
fn test_end_of_stream() {
    let factory = compile(vec![sig("end", vec![Segment::constant("END"), Segment::eos()])]);

    assert_eq!(classify(&factory, b"END").0, "end");
    assert!(classify(&factory, b"ENDX").0 != "end");

    let mut processor = factory.create_processor();
    let mut metadata = Metadata::new();
    let mut buffer = BytesMut::from(&b"END"[..]);
    processor.detect(&mut buffer, &mut metadata, false);
    assert_eq!(processor.status(), ProcessorStatus::Detecting);

    let signature = processor.detect(&mut buffer, &mut metadata, true);
    assert_eq!(signature.id(), "end");
}

#[rstest]
#[case(&b"ab!"[..], false)]
#[case(&b"abab!"[..], true)]
#[case(&b"ababab!"[..], true)]
#[case(&b"abababab!"[..], false)]
fn test_repeat_bounds(#[case] stream: &[u8], #[case] matches: bool) {
    let factory = compile(vec![sig(
        "rep",
        vec![
            Segment::repeat(vec![Segment::constant("ab")], 2, Some(3)),
            Segment::constant("!"),
        ],
    )]);
    let (id, status, _) = classify(&factory, stream);

    assert_eq!(id == "rep", matches);
    if !matches {
        assert_eq!(status, ProcessorStatus::Rejected);
    }
}

#[rstest]
#[case(&b"<>"[..])]
#[case(&b"<x>"[..])]
#[case(&b"<xxxx>"[..])]
fn test_optional_repeat(#[case] stream: &[u8]) {
    let factory = compile(vec![sig(
        "opt",
        vec![
            Segment::constant("<"),
            Segment::repeat(vec![Segment::constant("x")], 0, None),
            Segment::constant(">"),
        ],
    )]);
    assert_eq!(classify(&factory, stream).0, "opt");
}

/// Feeds a stream one byte at a time, as a trickling reader would
fn classify_bytewise(factory: &ProcessorFactory, data: &[u8]) -> (String, ProcessorStatus) {
    let mut processor = factory.create_processor();
    let mut metadata = Metadata::new();
    let mut buffer = BytesMut::new();

    for (index, byte) in data.iter().enumerate() {
        buffer.extend_from_slice(&[*byte]);
        processor.detect(&mut buffer, &mut metadata, index + 1 == data.len());
        if processor.is_finished() {
            break;
        }
    }
    (processor.content_signature().id().to_string(), processor.status())
}

#[fixture]
fn two_part_body() -> ProcessorFactory {
    compile(vec![sig(
        "s",
        vec![
            Segment::constant("X"),
            Segment::repeat(vec![Segment::constant("A"), Segment::constant("B")], 1, Some(3)),
        ],
    )])
}

#[rstest]
#[case(&b"XAB"[..], "s")]
#[case(&b"XABAC"[..], "s")]
#[case(&b"XABABA"[..], "s")]
#[case(&b"XABABAB"[..], "s")]
#[case(&b"XAC"[..], "application/octet-stream")]
fn test_repeat_iterates_only_on_whole_body(
    two_part_body: ProcessorFactory,
    #[case] stream: &[u8],
    #[case] expected: &str,
) {
    assert_eq!(classify(&two_part_body, stream).0, expected);
    assert_eq!(classify_bytewise(&two_part_body, stream).0, expected);
}

#[rstest]
fn test_repeat_body_matches_single_constant(two_part_body: ProcessorFactory) {
    let joined = compile(vec![sig(
        "s",
        vec![
            Segment::constant("X"),
            Segment::repeat(vec![Segment::constant("AB")], 1, Some(3)),
        ],
    )]);

    for stream in [&b"XABAC"[..], b"XABABX", b"XA"] {
        assert_eq!(classify(&joined, stream).0, classify(&two_part_body, stream).0);
    }
}

#[rstest]
#[case(&b"XY"[..], true)]
#[case(&b"XaY"[..], true)]
#[case(&b"XabY"[..], true)]
#[case(&b"XabcdY"[..], true)]
#[case(&b"XabcdeY"[..], false)]
#[case(&b"X"[..], false)]
fn test_repeat_body_with_variable_span(#[case] stream: &[u8], #[case] matches: bool) {
    let factory = compile(vec![sig(
        "var",
        vec![
            Segment::constant("X"),
            Segment::repeat(vec![Segment::any_between(0, Length::finite(2))], 2, Some(3)),
            Segment::constant("Y"),
        ],
    )]);

    let (id, status, _) = classify(&factory, stream);
    assert_eq!(id == "var", matches);
    assert_eq!(status == ProcessorStatus::Complete, matches);
    assert_eq!(classify_bytewise(&factory, stream).0 == "var", matches);
}

#[rstest]
#[case(Length::finite(4), 9)]
#[case(Length::INFINITE, 4)]
fn test_lookahead_covers_repeat_body(#[case] gap: Length, #[case] expected: usize) {
    let factory = compile(vec![sig(
        "framed",
        vec![
            Segment::constant("X"),
            Segment::repeat(
                vec![
                    Segment::constant("AB"),
                    Segment::any_between(0, gap),
                    Segment::constant("C"),
                ],
                1,
                None,
            ),
        ],
    )]);
    assert_eq!(factory.lookahead_count(), expected);
}

#[rstest]
#[case(&b"V1."[..], true)]
#[case(&b"V2."[..], true)]
#[case(&b"V3."[..], false)]
fn test_choice(#[case] stream: &[u8], #[case] matches: bool) {
    let factory = compile(vec![sig(
        "choice",
        vec![
            Segment::constant("V"),
            Segment::choice(vec![Segment::constant("1"), Segment::constant("2")]),
            Segment::constant("."),
        ],
    )]);
    assert_eq!(classify(&factory, stream).0 == "choice", matches);
}

#[rstest]
fn test_choice_takes_first_local_match() {
    let factory = compile(vec![sig(
        "first",
        vec![
            Segment::choice(vec![Segment::constant("a"), Segment::constant("ab")]),
            Segment::constant("c"),
        ],
    )]);

    assert_eq!(classify(&factory, b"ac").0, "first");
    // "a" wins locally; there is no backtracking into "ab"
    let (id, status, _) = classify(&factory, b"abc");
    assert!(id != "first");
    assert_eq!(status, ProcessorStatus::Rejected);
}

#[rstest]
fn test_open_span_runs_to_end_of_stream() {
    let factory = compile(vec![sig(
        "script",
        vec![Segment::constant("#!"), Segment::any_between(0, Length::INFINITE)],
    )]);

    let mut processor = factory.create_processor();
    let mut window = &b"#!/bin/sh\necho hi\n"[..];
    let signature = processor.detect(&mut window, &mut Metadata::new(), true);

    assert_eq!(signature.id(), "script");
    assert_eq!(processor.position(), 18);
}

#[rstest]
fn test_bounded_span_finds_follow() {
    let factory = compile(vec![sig(
        "tagged",
        vec![
            Segment::constant("<"),
            Segment::any_between(1, Length::finite(8)),
            Segment::constant(">"),
        ],
    )]);

    assert_eq!(classify(&factory, b"<body>").0, "tagged");
    assert_eq!(classify(&factory, b"<>").1, ProcessorStatus::Rejected);
    assert_eq!(classify(&factory, b"<longer-than-eight>").1, ProcessorStatus::Rejected);
}

// ============================================================================
// Metadata
// ============================================================================

#[rstest]
fn test_paired_key_and_value() {
    let factory = compile(vec![sig(
        "kv",
        vec![
            Segment::key("name:"),
            Segment::constant("="),
            Segment::value(),
            Segment::constant(";"),
        ],
    )]);
    let (id, _, metadata) = classify(&factory, b"name:color=red;");

    assert_eq!(id, "kv");
    assert_eq!(metadata.get("name:color").map(String::as_str), Some("red"));
    assert_eq!(metadata.len(), 1);
}

#[rstest]
#[case(&b"T=some long title\r\n"[..], "some long title")]
#[case(&b"T=unix line\n"[..], "unix line")]
#[case(&b"T=no terminator"[..], "no terminator")]
fn test_key_ends_at_choice_or_end_of_stream(#[case] stream: &[u8], #[case] expected: &str) {
    let factory = compile(vec![sig(
        "titled",
        vec![
            Segment::key("T="),
            Segment::choice(vec![
                Segment::constant("\r\n"),
                Segment::constant("\n"),
                Segment::eos(),
            ]),
        ],
    )]);

    let (id, _, metadata) = classify(&factory, stream);
    assert_eq!(id, "titled");
    assert_eq!(metadata.get("T=").map(String::as_str), Some(expected));

    let mut processor = factory.create_processor();
    let mut chunked = Metadata::new();
    let mut buffer = BytesMut::new();
    for chunk in stream.chunks(3) {
        buffer.extend_from_slice(chunk);
        processor.detect(&mut buffer, &mut chunked, false);
    }
    processor.detect(&mut buffer, &mut chunked, true);
    assert_eq!(chunked, metadata);
}

#[rstest]
fn test_seeded_metadata_takes_precedence(keyed_records: ProcessorFactory) {
    let mut processor = keyed_records.create_processor();
    let mut metadata = Metadata::new();
    metadata.insert("K=".to_string(), "seed".to_string());
    metadata.insert("other".to_string(), "kept".to_string());

    let mut window = &b"K=A;K=B;\x00"[..];
    let signature = processor.detect(&mut window, &mut metadata, true);

    assert_eq!(signature.id(), "s2");
    assert_eq!(metadata.get("K=").map(String::as_str), Some("seed"));
    assert_eq!(metadata.get("other").map(String::as_str), Some("kept"));
}

// ============================================================================
// Labels and compilation
// ============================================================================

#[rstest]
fn test_abstract_label_while_detecting() {
    let factory = compile(vec![
        sig("gif", vec![Segment::constant("GIF8")]).into_abstract(),
        sig("gif89a", vec![Segment::constant("GIF89a")]).with_parent("gif"),
    ]);

    let mut processor = factory.create_processor();
    let mut metadata = Metadata::new();
    let mut buffer = BytesMut::from(&b"GIF8"[..]);
    assert_eq!(processor.detect(&mut buffer, &mut metadata, false).id(), "gif");

    buffer.extend_from_slice(b"xx");
    let signature = processor.detect(&mut buffer, &mut metadata, true);
    assert!(signature.is_generic());
    assert_eq!(processor.status(), ProcessorStatus::Rejected);
    assert_eq!(processor.classification().id(), "gif");
}

#[rstest]
fn test_concrete_beats_abstract_on_identical_format() {
    for order in [[0, 1], [1, 0]] {
        let candidates = [
            sig("abstract", vec![Segment::constant("XY")]).into_abstract(),
            sig("concrete", vec![Segment::constant("XY")]),
        ];
        let factory = compile(order.iter().map(|&i| candidates[i].clone()).collect());
        assert_eq!(classify(&factory, b"XY").0, "concrete");
    }
}

#[rstest]
fn test_deeper_child_beats_parent_on_identical_format() {
    for order in [[0, 1], [1, 0]] {
        let candidates = [
            sig("parent", vec![Segment::constant("XY")]),
            sig("child", vec![Segment::constant("XY")]).with_parent("parent"),
        ];
        let factory = compile(order.iter().map(|&i| candidates[i].clone()).collect());
        assert_eq!(classify(&factory, b"XY").0, "child");
    }
}

#[rstest]
fn test_identical_signatures_keep_first() {
    let factory = compile(vec![
        sig("first", vec![Segment::constant("XY")]),
        sig("second", vec![Segment::constant("XY")]),
    ]);
    assert_eq!(classify(&factory, b"XY").0, "first");
}

#[rstest]
fn test_unmatched_stream_is_generic() {
    let factory = compile(vec![sig("s1", vec![Segment::constant("GIF8")])]);
    let (id, status, metadata) = classify(&factory, b"hello");

    assert_eq!(id, "application/octet-stream");
    assert_eq!(status, ProcessorStatus::Rejected);
    assert!(metadata.is_empty());
}

#[rstest]
fn test_lookahead_is_widest_edge() {
    let factory = compile(vec![
        sig("long", vec![Segment::constant("ABCDEFGH")]),
        sig("range", vec![Segment::constant("Z"), Segment::range_hex("000000", "0000FF").unwrap()]),
    ]);
    assert_eq!(factory.lookahead_count(), 8);

    let empty = compile(Vec::new());
    assert_eq!(empty.lookahead_count(), 1);
}

#[rstest]
fn test_constants_are_split_radix_style() {
    let signatures: Vec<Arc<ContentSignature>> = vec![
        Arc::new(sig("a", vec![Segment::constant("ABCD")])),
        Arc::new(sig("b", vec![Segment::constant("ABXY")])),
        Arc::new(sig("c", vec![Segment::constant("Q")])),
    ];
    let graph = AutomatonCompiler::new(CompilerOptions::default())
        .compile(&signatures)
        .unwrap();

    let root = graph.node(graph.root());
    let constants: Vec<&[u8]> = root
        .edges()
        .iter()
        .filter_map(|edge| match &edge.step {
            Step::Constant(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
        .collect();
    assert_eq!(constants.len(), 2);
    assert!(constants.contains(&&b"AB"[..]));

    let shared = graph.follow_constant(graph.root(), b"AB").unwrap();
    assert_eq!(graph.node(shared).edges().len(), 2);
    assert_eq!(graph.terminal_of("a"), graph.follow_constant(graph.root(), b"ABCD"));
    assert_eq!(graph.label_of(graph.root()).unwrap().id(), "application/octet-stream");
}

#[rstest]
fn test_strict_compilation_rejects_invalid_signature() {
    let signatures = vec![
        Arc::new(sig("ok", vec![Segment::constant("ok")])),
        Arc::new(sig("bad", vec![Segment::constant(Vec::<u8>::new())])),
    ];

    assert!(ProcessorFactory::from_signatures(&signatures, &CompilerOptions::default()).is_err());

    let factory = ProcessorFactory::from_signatures(&signatures, &CompilerOptions::lenient()).unwrap();
    assert_eq!(factory.graph().signatures().len(), 2);
    assert_eq!(classify(&factory, b"ok").0, "ok");
}

#[rstest]
fn test_duplicate_ids_rejected() {
    let signatures = vec![
        Arc::new(sig("dup", vec![Segment::constant("a")])),
        Arc::new(sig("dup", vec![Segment::constant("b")])),
    ];
    assert!(ProcessorFactory::from_signatures(&signatures, &CompilerOptions::default()).is_err());
    assert!(ProcessorFactory::from_signatures(&signatures, &CompilerOptions::lenient()).is_ok());
}

#[rstest]
fn test_finished_processor_ignores_input() {
    let factory = compile(vec![sig("s", vec![Segment::constant("AB")])]);
    let mut processor = factory.create_processor();
    let mut metadata = Metadata::new();
    let mut buffer = BytesMut::from(&b"ABCD"[..]);

    processor.detect(&mut buffer, &mut metadata, false);
    assert!(processor.is_finished());
    assert_eq!(&buffer[..], b"CD");

    let signature = processor.detect(&mut buffer, &mut metadata, true);
    assert_eq!(signature.id(), "s");
    assert_eq!(&buffer[..], b"CD");
}
