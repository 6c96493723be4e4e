pub mod chat;

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Classify one ad and print the assistant's JSON answer
    Classify {
        /// Ad text; read from stdin when omitted
        text: Option<String>,

        /// Also validate the answer shape
        #[arg(long)]
        validate: bool,
    },

    /// Talk to the assistant interactively
    Chat {
        /// Message sent before the first prompt
        #[arg(long)]
        opening: Option<String>,
    },

    /// Classify every unanalyzed document of a collection
    Analyze {
        #[arg(short, long)]
        collection: String,

        /// Field holding the ad text
        #[arg(long, default_value = "text")]
        text_field: String,

        /// Field that receives the classification
        #[arg(long, default_value = "analysis")]
        analysis_field: String,
    },

    /// Create a new assistant and print its id
    CreateAssistant {
        #[arg(short, long)]
        name: String,

        /// Instruction text, or @path to read it from a file
        #[arg(short, long)]
        instructions: String,

        #[arg(short, long)]
        model: Option<String>,

        /// Previously uploaded file ids to attach
        #[arg(long)]
        file_id: Vec<String>,
    },

    /// Upload a file for use by assistants
    UploadFile { path: PathBuf },
}
