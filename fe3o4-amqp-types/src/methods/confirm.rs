//! `confirm` class methods (RabbitMQ extension)

use bytes::{Buf, BufMut};

use crate::codec;
use crate::error::Error;

/// Puts the channel into publisher-confirm mode. Once selected the server
/// acks or nacks every publish with a monotonically increasing delivery tag.
/// `confirm.select`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmSelect {
    /// Do not wait for a select-ok reply
    pub no_wait: bool,
}

impl ConfirmSelect {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.no_wait as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            no_wait: codec::read_u8(src)? & 1 != 0,
        })
    }
}
