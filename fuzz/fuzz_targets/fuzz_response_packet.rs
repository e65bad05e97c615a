#![no_main]

use libfuzzer_sys::fuzz_target;
use im_signin::protocol::message::try_decode_response_packet;
use im_signin::{decode_response_packet, ResponsePacket, SignInRequest};

fuzz_target!(|data: &[u8]| {
    // Decoding must never panic; faults fold into the sentinel packet
    let packet = decode_response_packet(data);
    if try_decode_response_packet(data).is_err() {
        assert_eq!(packet, ResponsePacket::parse_error());
    }
    let _ = SignInRequest::decode(data);
});
