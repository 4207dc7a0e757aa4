/*!
 * Channel Endpoints
 * Producer and consumer halves of a channel paired with its semaphore
 *
 * A post on the semaphore always follows a complete write pass, and a read
 * pass only starts after a completed wait. Both sides are exposed as
 * separate calls so callers can timestamp the copy on its own.
 */

use super::channel::SharedChannel;
use super::semaphore::NamedSemaphore;
use super::types::IpcResult;
use crate::core::types::Word;

/// A channel plus the name of its semaphore, as handed to a stage
#[derive(Debug)]
pub struct Link {
    pub channel: SharedChannel,
    pub semaphore: String,
}

/// The (at most two) channels adjacent to one pipeline position
#[derive(Debug, Default)]
pub struct StageLinks {
    /// Channel `position - 1`, read by this stage
    pub upstream: Option<Link>,
    /// Channel `position`, written by this stage
    pub downstream: Option<Link>,
}

/// Producer side of a channel
#[derive(Debug)]
pub struct ChannelWriter {
    channel: SharedChannel,
    ready: NamedSemaphore,
}

impl ChannelWriter {
    /// Open the link's semaphore by name
    pub fn open(link: Link) -> IpcResult<Self> {
        let ready = NamedSemaphore::open(&link.semaphore)?;
        Ok(Self {
            channel: link.channel,
            ready,
        })
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    /// Copy a whole message into the channel
    pub fn write(&mut self, message: &[Word]) -> IpcResult<()> {
        self.channel.write(message)
    }

    /// Mark the message written by the last `write` as ready
    pub fn signal(&self) -> IpcResult<()> {
        self.ready.post()
    }

    /// Close the semaphore handle and unmap the channel
    pub fn close(self) -> IpcResult<()> {
        self.ready.close()?;
        self.channel.unmap()
    }
}

/// Consumer side of a channel
#[derive(Debug)]
pub struct ChannelReader {
    channel: SharedChannel,
    ready: NamedSemaphore,
}

impl ChannelReader {
    /// Open the link's semaphore by name
    pub fn open(link: Link) -> IpcResult<Self> {
        let ready = NamedSemaphore::open(&link.semaphore)?;
        Ok(Self {
            channel: link.channel,
            ready,
        })
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    /// Block until the producer signals a complete message
    pub fn wait(&self) -> IpcResult<()> {
        self.ready.wait()
    }

    /// Copy the ready message out of the channel
    pub fn read_into(&self, message: &mut [Word]) -> IpcResult<()> {
        self.channel.read_into(message)
    }

    /// Close the semaphore handle and unmap the channel
    pub fn close(self) -> IpcResult<()> {
        self.ready.close()?;
        self.channel.unmap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::SEMAPHORE_MODE;
    use std::thread;

    #[test]
    fn test_messages_arrive_in_order() {
        let name = format!("/anti_lru_unit_{}_endpoint", std::process::id());
        let _ = NamedSemaphore::unlink(&name);
        let (owner, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();

        let channel = SharedChannel::map(0, 4096).unwrap();
        let words = channel.words();

        let mut writer = ChannelWriter::open(Link {
            channel,
            semaphore: name.clone(),
        })
        .unwrap();
        let reader_sem = NamedSemaphore::open(&name).unwrap();

        // Single-threaded hand-off: write, signal, wait, read.
        let mut received = Vec::new();
        let mut scratch = vec![0; words];
        for k in 0..4 {
            writer.write(&vec![k; words]).unwrap();
            writer.signal().unwrap();
            reader_sem.wait().unwrap();
            writer.channel().read_into(&mut scratch).unwrap();
            received.push(scratch[0]);
        }
        assert_eq!(received, vec![0, 1, 2, 3]);

        reader_sem.close().unwrap();
        writer.close().unwrap();
        owner.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_reader_blocks_until_signal() {
        let name = format!("/anti_lru_unit_{}_endpoint_block", std::process::id());
        let _ = NamedSemaphore::unlink(&name);
        let (owner, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();

        let mut writer_channel = SharedChannel::map(0, 4096).unwrap();
        let words = writer_channel.words();
        writer_channel.write(&vec![5; words]).unwrap();

        let reader = ChannelReader::open(Link {
            channel: writer_channel,
            semaphore: name.clone(),
        })
        .unwrap();

        let handle = thread::spawn(move || {
            reader.wait().unwrap();
            let mut out = vec![0; words];
            reader.read_into(&mut out).unwrap();
            reader.close().unwrap();
            out
        });

        owner.post().unwrap();
        assert!(handle.join().unwrap().iter().all(|&w| w == 5));

        owner.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
    }
}
