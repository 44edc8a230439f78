// Deployment outputs.

use crate::template::OutputDecl;
use crate::types::{OUTPUT_API_URL, OUTPUT_API_URL_DESCRIPTION};

use super::api::HttpApi;
use super::StackContext;

pub fn declare(ctx: &mut StackContext, api: &HttpApi) -> OutputDecl {
    let output = OutputDecl {
        value: api.url(),
        description: Some(OUTPUT_API_URL_DESCRIPTION.to_string()),
    };
    ctx.add_output(OUTPUT_API_URL, output.clone());
    output
}
