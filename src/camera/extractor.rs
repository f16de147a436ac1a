//! JPEG frame extraction from an MJPEG byte stream
//!
//! Frames are delimited by the SOI (`FF D8`) and EOI (`FF D9`) markers.
//! The extractor makes no assumptions about chunk boundaries or arrival
//! timing. When several complete frames arrive in one chunk only the
//! newest is kept: the feed serves "latest frame", dropping older ones in
//! favor of freshness.

/// JPEG start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Buffer ceiling; an unresolved frame beyond this resets the buffer
pub const MAX_BUFFER: usize = 5 * 1024 * 1024;

/// Incremental extractor over an unbounded MJPEG stream
pub struct JpegExtractor {
    buffer: Vec<u8>,
}

impl JpegExtractor {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed one chunk; returns the newest complete frame it produced
    ///
    /// Returns `None` while a frame is still partial. A payload byte
    /// sequence that merely resembles a marker (e.g. `FF D0` restart
    /// markers) does not terminate the frame.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut latest = None;
        loop {
            let Some(start) = find_marker(&self.buffer, &SOI) else {
                // No frame in flight: discard scanned bytes, keeping a
                // trailing 0xFF that may be the first half of a split SOI.
                let keep_ff = self.buffer.last() == Some(&0xFF);
                self.buffer.clear();
                if keep_ff {
                    self.buffer.push(0xFF);
                }
                break;
            };
            if start > 0 {
                self.buffer.drain(..start);
            }

            match find_marker(&self.buffer[SOI.len()..], &EOI) {
                Some(rel) => {
                    let end = SOI.len() + rel + EOI.len();
                    let frame: Vec<u8> = self.buffer.drain(..end).collect();
                    latest = Some(frame);
                }
                None => break, // partial frame, wait for more data
            }
        }

        if latest.is_none() && self.buffer.len() > MAX_BUFFER {
            self.buffer.clear();
        }
        latest
    }
}

impl Default for JpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    if haystack.len() < 2 {
        return None;
    }
    (0..haystack.len() - 1).find(|&i| haystack[i] == marker[0] && haystack[i + 1] == marker[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(payload);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn test_single_frame() {
        let mut ex = JpegExtractor::new();
        let frame = framed(b"payload");
        assert_eq!(ex.push(&frame), Some(frame));
    }

    #[test]
    fn test_latest_frame_wins_within_chunk() {
        let mut ex = JpegExtractor::new();
        let mut chunk = framed(b"payload1");
        chunk.extend_from_slice(&framed(b"payload2"));

        let got = ex.push(&chunk).unwrap();
        assert_eq!(got, framed(b"payload2"));
    }

    #[test]
    fn test_garbage_prefix_discarded() {
        let mut ex = JpegExtractor::new();
        let mut chunk = vec![0x12, 0x34, 0x56];
        chunk.extend_from_slice(&framed(b"payload"));

        assert_eq!(ex.push(&chunk), Some(framed(b"payload")));
    }

    #[test]
    fn test_partial_frame_held_until_eoi() {
        let mut ex = JpegExtractor::new();
        let mut open = SOI.to_vec();
        open.extend_from_slice(b"payload");

        assert_eq!(ex.push(&open), None);
        assert_eq!(ex.push(b"more"), None);
        assert_eq!(ex.push(&EOI), Some(framed(b"payloadmore")));
    }

    #[test]
    fn test_embedded_marker_like_bytes_ignored() {
        let mut ex = JpegExtractor::new();
        // FF D0 (restart marker) must not terminate the frame early
        let payload = [0x01, 0xFF, 0xD0, 0x02];
        let frame = framed(&payload);
        assert_eq!(ex.push(&frame), Some(frame));
    }

    #[test]
    fn test_eoi_split_across_chunks() {
        let mut ex = JpegExtractor::new();
        let frame = framed(b"abc");
        let (a, b) = frame.split_at(frame.len() - 1);

        assert_eq!(ex.push(a), None);
        assert_eq!(ex.push(b), Some(frame));
    }

    #[test]
    fn test_soi_split_across_chunks() {
        let mut ex = JpegExtractor::new();
        let frame = framed(b"xyz");

        assert_eq!(ex.push(&frame[..1]), None); // just 0xFF
        assert_eq!(ex.push(&frame[1..]), Some(frame));
    }

    #[test]
    fn test_frames_across_garbage_gap() {
        let mut ex = JpegExtractor::new();
        assert_eq!(ex.push(&framed(b"one")), Some(framed(b"one")));
        assert_eq!(ex.push(b"noise without markers"), None);
        assert_eq!(ex.push(&framed(b"two")), Some(framed(b"two")));
    }

    #[test]
    fn test_buffer_ceiling_reset() {
        let mut ex = JpegExtractor::new();
        let mut open = SOI.to_vec();
        open.extend_from_slice(&vec![0u8; MAX_BUFFER + 16]);

        assert_eq!(ex.push(&open), None);
        assert!(ex.buffer.is_empty());

        // The extractor recovers on the next clean frame
        assert_eq!(ex.push(&framed(b"after")), Some(framed(b"after")));
    }
}
