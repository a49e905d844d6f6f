use std::cell::RefCell;
use std::rc::Rc;

use balsa::{BalsaFrame, BalsaFrameError, BalsaHeaders, BalsaVisitor};

/// One recorded framer event. Body, raw-body and chunk-extension bytes
/// are accumulated separately (see [`Recorder`]) because their
/// segmentation legitimately depends on how the input was chunked;
/// everything else must be identical however the bytes arrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    RequestFirstLine {
        line: Vec<u8>,
        method: Vec<u8>,
        uri: Vec<u8>,
        version: Vec<u8>,
    },
    ResponseFirstLine {
        line: Vec<u8>,
        version: Vec<u8>,
        code: Vec<u8>,
        reason: Vec<u8>,
    },
    Header {
        name: Vec<u8>,
        value: Vec<u8>,
    },
    HeaderInput(Vec<u8>),
    ProcessHeaders(Vec<(Vec<u8>, Vec<u8>)>),
    HeaderDone,
    InterimHeaders {
        status: u32,
        lines: Vec<(Vec<u8>, Vec<u8>)>,
    },
    ContinueHeaderDone,
    ChunkLength(u64),
    TrailerInput(Vec<u8>),
    ProcessTrailers(Vec<(Vec<u8>, Vec<u8>)>),
    MessageDone,
    Error(BalsaFrameError),
    Warning(BalsaFrameError),
}

fn pairs(headers: &BalsaHeaders) -> Vec<(Vec<u8>, Vec<u8>)> {
    headers
        .lines()
        .map(|(name, value)| (name.to_vec(), value.to_vec()))
        .collect()
}

/// An event sink that records everything it sees.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pub raw_body: Vec<u8>,
    pub body: Vec<u8>,
    pub chunk_extensions: Vec<u8>,
}

impl BalsaVisitor for Recorder {
    fn on_request_first_line(&mut self, line: &[u8], method: &[u8], uri: &[u8], version: &[u8]) {
        self.events.push(Event::RequestFirstLine {
            line: line.to_vec(),
            method: method.to_vec(),
            uri: uri.to_vec(),
            version: version.to_vec(),
        });
    }

    fn on_response_first_line(&mut self, line: &[u8], version: &[u8], code: &[u8], reason: &[u8]) {
        self.events.push(Event::ResponseFirstLine {
            line: line.to_vec(),
            version: version.to_vec(),
            code: code.to_vec(),
            reason: reason.to_vec(),
        });
    }

    fn on_header(&mut self, name: &[u8], value: &[u8]) {
        self.events.push(Event::Header {
            name: name.to_vec(),
            value: value.to_vec(),
        });
    }

    fn on_header_input(&mut self, raw: &[u8]) {
        self.events.push(Event::HeaderInput(raw.to_vec()));
    }

    fn process_headers(&mut self, headers: &BalsaHeaders) {
        self.events.push(Event::ProcessHeaders(pairs(headers)));
    }

    fn header_done(&mut self) {
        self.events.push(Event::HeaderDone);
    }

    fn on_interim_headers(&mut self, headers: &BalsaHeaders) {
        self.events.push(Event::InterimHeaders {
            status: headers.parsed_response_code(),
            lines: pairs(headers),
        });
    }

    fn continue_header_done(&mut self) {
        self.events.push(Event::ContinueHeaderDone);
    }

    fn on_raw_body_input(&mut self, raw: &[u8]) {
        self.raw_body.extend_from_slice(raw);
    }

    fn on_body_chunk_input(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn on_chunk_length(&mut self, length: u64) {
        self.events.push(Event::ChunkLength(length));
    }

    fn on_chunk_extension_input(&mut self, ext: &[u8]) {
        self.chunk_extensions.extend_from_slice(ext);
    }

    fn on_trailer_input(&mut self, raw: &[u8]) {
        self.events.push(Event::TrailerInput(raw.to_vec()));
    }

    fn process_trailers(&mut self, trailers: &BalsaHeaders) {
        self.events.push(Event::ProcessTrailers(pairs(trailers)));
    }

    fn message_done(&mut self) {
        self.events.push(Event::MessageDone);
    }

    fn handle_error(&mut self, code: BalsaFrameError) {
        self.events.push(Event::Error(code));
    }

    fn handle_warning(&mut self, code: BalsaFrameError) {
        self.events.push(Event::Warning(code));
    }
}

/// A fully wired framer: recording visitor plus all three storages.
pub struct Harness {
    pub frame: BalsaFrame,
    pub recorder: Rc<RefCell<Recorder>>,
    pub headers: Rc<RefCell<BalsaHeaders>>,
    pub trailer: Rc<RefCell<BalsaHeaders>>,
    pub continue_headers: Rc<RefCell<BalsaHeaders>>,
}

impl Harness {
    pub fn new(is_request: bool) -> Self {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let headers = Rc::new(RefCell::new(BalsaHeaders::new()));
        let trailer = Rc::new(RefCell::new(BalsaHeaders::new()));
        let continue_headers = Rc::new(RefCell::new(BalsaHeaders::new()));
        let mut frame = BalsaFrame::new();
        frame.set_is_request(is_request);
        frame.set_visitor(Some(recorder.clone() as Rc<RefCell<dyn BalsaVisitor>>));
        frame.set_headers_storage(Some(headers.clone()));
        frame.set_trailer_storage(Some(trailer.clone()));
        frame.set_continue_storage(Some(continue_headers.clone()));
        Self {
            frame,
            recorder,
            headers,
            trailer,
            continue_headers,
        }
    }

    pub fn request() -> Self {
        Self::new(true)
    }

    pub fn response() -> Self {
        Self::new(false)
    }

    /// Feeds the input in windows of at most `size` bytes, re-offering
    /// unconsumed bytes, until everything is consumed or the framer
    /// stops making progress. Returns the total consumed.
    pub fn feed_in_chunks(&mut self, input: &[u8], size: usize) -> usize {
        let mut offset = 0;
        while offset < input.len() {
            let end = (offset + size).min(input.len());
            let consumed = self.frame.process_input(&input[offset..end]);
            offset += consumed;
            if consumed == 0 {
                break;
            }
        }
        offset
    }

    pub fn events(&self) -> Vec<Event> {
        self.recorder.borrow().events.clone()
    }

    pub fn body(&self) -> Vec<u8> {
        self.recorder.borrow().body.clone()
    }

    pub fn raw_body(&self) -> Vec<u8> {
        self.recorder.borrow().raw_body.clone()
    }

    pub fn chunk_extensions(&self) -> Vec<u8> {
        self.recorder.borrow().chunk_extensions.clone()
    }
}

/// Runs a complete message through a fresh harness at the given chunk
/// size.
pub fn run_chunked(is_request: bool, input: &[u8], size: usize) -> Harness {
    let mut harness = Harness::new(is_request);
    harness.feed_in_chunks(input, size);
    harness
}
