use std::io;
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Abort handle able to unblock a read pending on some source.
pub trait Interrupt: Send + Sync {
    fn interrupt(&self) -> io::Result<()>;
}

/// For sources with no way to abort a pending read.
///
/// A pump closed while blocked on such a source only stops once the next byte,
/// end-of-stream or error arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInterrupt;

impl Interrupt for NoInterrupt {
    fn interrupt(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts a closure into an [`Interrupt`].
pub struct InterruptFn<F>(pub F);

impl<F> Interrupt for InterruptFn<F>
where
    F: Fn() -> io::Result<()> + Send + Sync,
{
    fn interrupt(&self) -> io::Result<()> {
        (self.0)()
    }
}

impl Interrupt for Box<dyn Interrupt> {
    fn interrupt(&self) -> io::Result<()> {
        (**self).interrupt()
    }
}

impl Interrupt for TcpStream {
    fn interrupt(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Read)
    }
}

#[cfg(unix)]
impl Interrupt for UnixStream {
    fn interrupt(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Read)
    }
}
