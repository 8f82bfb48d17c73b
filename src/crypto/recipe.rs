//! ALFA Reveal - Offline Decryption Recipe
//!
//! When the page cannot decrypt in place, hand the viewer a CyberChef recipe
//! with every public parameter pre-filled. Only the passphrase is left blank.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::metadata::EncryptionMetadata;

/// CyberChef base URL
pub const CYBERCHEF_URL: &str = "https://gchq.github.io/CyberChef/";

/// External tool recipe for one encrypted block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineRecipe {
    /// Text the viewer edits inside the tool (KEY line + parameters)
    pub input: String,
    /// Link that opens the tool with recipe and input loaded
    pub link: String,
}

/// Build the recipe for `metadata` and the hex ciphertext from `data-content`
pub fn offline_recipe(metadata: &EncryptionMetadata, content_hex: &str) -> OfflineRecipe {
    let input = format!(
        "Only change the KEY line. You may need to press the blue BAKE button to refresh the output.\n\
         KEY: <type your key here>\n\
         \n\
         salt:{}\n\
         iv:{}\n\
         data:{}\n\
         tag:{}\n",
        STANDARD.encode(&metadata.salt),
        STANDARD.encode(&metadata.init),
        content_hex,
        STANDARD.encode(&metadata.tag),
    );

    let recipe = format!(
        "Register('KEY:%20(.*)$',true,true,false)\
         Register('salt:(%5Ba-zA-Z0-9%2B/%3D%5D*)$',true,true,false)\
         Register('iv:(%5Ba-zA-Z0-9%2B/%3D%5D*)$',true,true,false)\
         Register('data:(%5B0-9a-f%5D*)$',true,true,false)\
         Register('tag:(%5Ba-zA-Z0-9%2B/%3D%5D*)$',true,true,false)\
         Find_/_Replace(%7B'option':'Regex','string':'.*'%7D,'',true,false,true,true)\
         Derive_PBKDF2_key(%7B'option':'UTF8','string':'$R0'%7D,256,{iterations},'{hash}',%7B'option':'Base64','string':'$R1'%7D)\
         Register('(%5B%5C%5Cs%5C%5CS%5D*)',true,false,false)\
         Find_/_Replace(%7B'option':'Regex','string':'%5E.*$'%7D,'$R3',true,false,false,false)\
         AES_Decrypt(%7B'option':'Hex','string':'$R5'%7D,%7B'option':'Base64','string':'$R2'%7D,'GCM','Hex','Raw',%7B'option':'Base64','string':'$R4'%7D,%7B'option':'Hex','string':''%7D)",
        iterations = metadata.iterations,
        hash = metadata.hash.compact_name(),
    );

    let encoded_input = STANDARD.encode(input.as_bytes()).replace('=', "");
    let link = format!(
        "{}#recipe={}&input={}",
        CYBERCHEF_URL,
        recipe,
        encode_uri_component(&encoded_input)
    );

    OfflineRecipe { input, link }
}

/// Percent-encode the two base64 characters that are not URI-safe
fn encode_uri_component(base64: &str) -> String {
    base64.replace('+', "%2B").replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::HashAlgorithm;

    fn meta() -> EncryptionMetadata {
        EncryptionMetadata {
            salt: vec![0xfb; 16],
            init: vec![1; 12],
            hash: HashAlgorithm::Sha512,
            tag: vec![0xff; 16],
            iterations: 250_000,
        }
    }

    #[test]
    fn test_recipe_carries_parameters() {
        let recipe = offline_recipe(&meta(), "deadbeef");

        assert!(recipe.input.contains("data:deadbeef\n"));
        assert!(recipe.input.contains(&format!("salt:{}\n", STANDARD.encode([0xfb; 16]))));
        assert!(recipe.link.starts_with(CYBERCHEF_URL));
        assert!(recipe.link.contains(",256,250000,'SHA512',"));
    }

    #[test]
    fn test_link_input_is_uri_safe() {
        let recipe = offline_recipe(&meta(), "00");
        let input = recipe.link.split("&input=").nth(1).unwrap();

        assert!(!input.contains('+'));
        assert!(!input.contains('/'));
        assert!(!input.contains('='));
    }
}
