pub mod prompt_dump;
