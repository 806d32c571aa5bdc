pub mod vbyte;
