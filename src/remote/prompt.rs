//! Request building for the vision table extractor.
//!
//! The instruction is fixed: the model is asked to return the table found in
//! the image as a markdown table.  The image travels inline as a base64
//! `data:` URL.

use base64::{prelude::BASE64_STANDARD, Engine as _};
use serde_json::json;

/// "Extract the table in this image as a markdown table."
pub const TABLE_INSTRUCTION: &str = "이 이미지의 표 내용을 마크다운 표로 추출해줘.";

/// Encode binary data as a `data:` URL.
///
/// ```
/// use math_ocr::remote::data_url;
///
/// assert_eq!(data_url("image/jpeg", b"hi"), "data:image/jpeg;base64,aGk=");
/// ```
pub fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(data))
}

/// Chat-completion body carrying [`TABLE_INSTRUCTION`] and one image.
pub fn table_request(model: &str, max_tokens: u32, image_url: &str) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": TABLE_INSTRUCTION },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            }
        ],
        "max_tokens": max_tokens
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trips_through_base64() {
        let url = data_url("image/png", &[0, 1, 2, 250]);
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(BASE64_STANDARD.decode(encoded).unwrap(), vec![0, 1, 2, 250]);
    }

    #[test]
    fn table_request_shape() {
        let body = table_request("gpt-4o", 1024, "data:image/jpeg;base64,AAAA");

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1024);
        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], TABLE_INSTRUCTION);
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }
}
