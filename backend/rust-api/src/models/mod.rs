pub mod achievement;
pub mod activity;
pub mod challenge;
pub mod chat;
pub mod conversation;
pub mod flashcard;
pub mod mascot;
pub mod progress;
pub mod streak;
pub mod translation;
