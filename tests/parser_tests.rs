use pretty_assertions::assert_eq;
use v8_trace_studio::parser::{parse_stream, LineOutcome, ParseMode, TraceParser};

const ROOT: &str = "--- FUNCTION SOURCE (/app/server.js:handle) id{4,-1} start{812} ---";
const PARSE: &str = "--- FUNCTION SOURCE (/app/util.js:parse) id{4,0} start{120} ---";
const FORMAT: &str = "--- FUNCTION SOURCE (/app/util.js:format) id{4,1} start{300} ---";
const END: &str = "--- END ---";

fn run(input: &str) -> (String, v8_trace_studio::parser::InliningRecord) {
    let mut out = Vec::new();
    let inlined = parse_stream(input.as_bytes(), &mut out).unwrap();
    (String::from_utf8(out).unwrap(), inlined)
}

#[test]
fn test_inlining_recorded_with_caller() {
    let input = [
        ROOT, "(body)", END, PARSE, "(body)", END, "INLINE (parse) id{4,0} AS 1 AT <0:845>",
    ]
    .join("\n");

    let (out, inlined) = run(&input);

    assert_eq!(out, "");
    let frames = inlined.get("parse /app/util.js").unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].id, 4);
    assert_eq!(frames[0].index, 0);
    assert_eq!(frames[0].start, 120);

    let caller = frames[0].caller.as_ref().unwrap();
    assert_eq!(caller.function, "handle");
    assert_eq!(caller.file, "/app/server.js");
    assert!(caller.is_root());
}

#[test]
fn test_mismatched_name_is_dropped() {
    let input = [ROOT, END, PARSE, END, "INLINE (format) id{4,0} AS 1 AT <0:845>"].join("\n");

    let (_, inlined) = run(&input);

    assert!(inlined.is_empty());
}

#[test]
fn test_inline_applies_to_most_recent_header_only() {
    let input = [
        ROOT, END, PARSE, END, FORMAT, END,
        "INLINE (parse) id{4,0} AS 1 AT <0:845>",
        "INLINE (format) id{4,1} AS 2 AT <0:900>",
    ]
    .join("\n");

    let (_, inlined) = run(&input);

    assert!(inlined.get("parse /app/util.js").is_none());
    assert_eq!(inlined.get("format /app/util.js").unwrap().len(), 1);
}

#[test]
fn test_repeated_inlining_preserves_order() {
    let second_root = "--- FUNCTION SOURCE (/app/server.js:route) id{9,-1} start{40} ---";
    let second_parse = "--- FUNCTION SOURCE (/app/util.js:parse) id{9,0} start{120} ---";
    let input = [
        ROOT, END, PARSE, END, "INLINE (parse) id{4,0} AS 1 AT <0:845>",
        second_root, END, second_parse, END, "INLINE (parse) id{9,0} AS 1 AT <0:60>",
    ]
    .join("\n");

    let (_, inlined) = run(&input);

    let frames = inlined.get("parse /app/util.js").unwrap();
    let callers: Vec<_> = frames
        .iter()
        .map(|f| f.caller.as_ref().unwrap().function.as_str())
        .collect();
    assert_eq!(callers, vec!["handle", "route"]);
    assert_eq!(inlined.total_events(), 2);
}

#[test]
fn test_program_output_passes_through_in_order() {
    let input = format!(
        "listening\n{}\nconsole.log inside source\n{}\nrequest 1\nrequest 2",
        ROOT, END
    );

    let (out, _) = run(&input);

    assert_eq!(out, "listening\nrequest 1\nrequest 2");
}

#[test]
fn test_header_inside_open_block_does_not_break_parsing() {
    let mut parser = TraceParser::new();

    assert_eq!(parser.feed_line(ROOT), LineOutcome::Consumed);
    assert_eq!(parser.feed_line(PARSE), LineOutcome::Consumed);
    assert_eq!(parser.mode(), ParseMode::InOptSourceBlock);
    assert_eq!(parser.feed_line(END), LineOutcome::Consumed);
    assert_eq!(parser.mode(), ParseMode::Normal);

    // The header swallowed by the open block never became an inlinee
    parser.feed_line("INLINE (parse) id{4,0} AS 1 AT <0:845>");
    assert!(parser.inlined().is_empty());
    assert_eq!(parser.feed_line("after"), LineOutcome::PassThrough);
}

#[test]
fn test_final_line_without_newline_round_trips() {
    let input = format!("{}\n{}\n{}\nserver closed", ROOT, "(body)", END);

    let (out, _) = run(&input);

    assert_eq!(out, "server closed");
}

#[test]
fn test_unterminated_block_swallows_rest() {
    let input = format!("before\n{}\nnever closed\nstill inside", ROOT);

    let (out, inlined) = run(&input);

    assert_eq!(out, "before\n");
    assert!(inlined.is_empty());
}

#[test]
fn test_forwarded_bytes_keep_terminators() {
    let mut bytes = b"plain\r\n".to_vec();
    bytes.extend_from_slice(&[0x66, 0xff, 0x6f, b'\n']);
    let mut out = Vec::new();

    parse_stream(bytes.as_slice(), &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "plain\r\nf\u{fffd}o\n");
}
