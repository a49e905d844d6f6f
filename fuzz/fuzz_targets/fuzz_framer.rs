#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate balsa;

use std::cell::RefCell;
use std::rc::Rc;

use balsa::{BalsaFrame, BalsaHeaders, BalsaVisitor, InvalidCharsLevel, NoOpVisitor};

struct Fuzzer {
    frame: BalsaFrame,
}

impl Fuzzer {
    fn new(is_request: bool) -> Self {
        let mut frame = BalsaFrame::new();
        frame.set_is_request(is_request);
        frame.set_invalid_chars_level(InvalidCharsLevel::Warn);
        frame.set_headers_storage(Some(Rc::new(RefCell::new(BalsaHeaders::new()))));
        frame.set_trailer_storage(Some(Rc::new(RefCell::new(BalsaHeaders::new()))));
        frame.set_continue_storage(Some(Rc::new(RefCell::new(BalsaHeaders::new()))));
        frame.set_visitor(Some(
            Rc::new(RefCell::new(NoOpVisitor)) as Rc<RefCell<dyn BalsaVisitor>>
        ));
        Fuzzer { frame }
    }

    fn run(&mut self, data: &[u8]) {
        // Feed in ragged windows so state is exercised across call
        // boundaries, and check the byte-accounting invariants.
        let mut offset = 0;
        let mut window = 1;
        while offset < data.len() {
            let end = std::cmp::min(offset + window, data.len());
            let consumed = self.frame.process_input(&data[offset..end]);
            assert!(consumed <= end - offset);
            if self.frame.is_error() {
                // Once fatal, every further call must consume nothing.
                assert_eq!(self.frame.process_input(&data[offset..]), 0);
                return;
            }
            if consumed == 0 && self.frame.message_fully_read() {
                self.frame.reset();
                continue;
            }
            if consumed == 0 {
                offset = end;
            } else {
                offset += consumed;
            }
            window = window % 7 + 1;
        }
        self.frame.connection_closed();
    }
}

fuzz_target!(|data: &[u8]| {
    Fuzzer::new(true).run(data);
    Fuzzer::new(false).run(data);
});
